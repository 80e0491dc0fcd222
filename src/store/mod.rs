//! Resource Store
//!
//! Strongly consistent, watchable record storage keyed by `(Kind, namespace, name)`.
//! Writes are guarded by per-record optimistic versioning: an update or status
//! update must carry the record's current `resource_version` or it fails with
//! [`StoreError::Conflict`]. Deleting a record cascades to every record whose
//! owner references name it.

pub mod client;
pub mod memory;
pub mod persistence;

pub use client::Client;
pub use memory::MemoryStore;
pub use persistence::SledStore;

use crate::api::{ObjectMeta, Resource};
use crate::error::StoreError;
use crate::types::{Kind, ObjectKey};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

/// Capacity of the change-notification channel of every store
pub const WATCH_CHANNEL_CAPACITY: usize = 1024;

/// Untyped stored record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObject {
    pub metadata: ObjectMeta,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub spec: Value,
    /// Null until something writes a status
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub status: Value,
}

impl RawObject {
    pub fn key(&self) -> ObjectKey {
        self.metadata.key()
    }

    pub fn from_resource<R: Resource>(resource: &R) -> Result<Self, StoreError> {
        Ok(serde_json::from_value(serde_json::to_value(resource)?)?)
    }

    pub fn into_resource<R: Resource>(self) -> Result<R, StoreError> {
        Ok(serde_json::from_value(serde_json::to_value(self)?)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventType {
    Added,
    Modified,
    Deleted,
}

/// Change notification emitted after every successful write
#[derive(Debug, Clone)]
pub struct WatchEvent {
    pub kind: Kind,
    pub event_type: WatchEventType,
    pub object: RawObject,
}

/// Storage port consumed by the reconciler and the controller
#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn get(&self, kind: Kind, key: &ObjectKey) -> Result<RawObject, StoreError>;

    /// All records of `kind`, optionally restricted to one namespace, ordered by key
    async fn list(&self, kind: Kind, namespace: Option<&str>) -> Result<Vec<RawObject>, StoreError>;

    async fn create(&self, kind: Kind, object: RawObject) -> Result<RawObject, StoreError>;

    /// Replace metadata labels, owner references and spec; status is left untouched
    async fn update(&self, kind: Kind, object: RawObject) -> Result<RawObject, StoreError>;

    /// Replace status only
    async fn update_status(&self, kind: Kind, object: RawObject) -> Result<RawObject, StoreError>;

    async fn delete(&self, kind: Kind, key: &ObjectKey) -> Result<(), StoreError>;

    fn watch(&self) -> broadcast::Receiver<WatchEvent>;
}

/// Stamp a new record with identity and initial versions
pub(crate) fn admit_create(mut object: RawObject) -> RawObject {
    if object.metadata.uid.is_empty() {
        object.metadata.uid = uuid::Uuid::new_v4().to_string();
    }
    object.metadata.resource_version = 1;
    object.metadata.generation = 1;
    object
}

fn check_version(kind: Kind, current: &RawObject, incoming: &RawObject) -> Result<(), StoreError> {
    if incoming.metadata.resource_version != current.metadata.resource_version {
        return Err(StoreError::Conflict {
            kind,
            key: current.key(),
            expected: incoming.metadata.resource_version,
            actual: current.metadata.resource_version,
        });
    }
    Ok(())
}

/// Compute the record that replaces `current` on a spec update
pub(crate) fn admit_update(
    kind: Kind,
    current: &RawObject,
    incoming: RawObject,
) -> Result<RawObject, StoreError> {
    check_version(kind, current, &incoming)?;

    let spec_changed = incoming.spec != current.spec;
    let mut next = current.clone();
    next.metadata.labels = incoming.metadata.labels;
    next.metadata.owner_references = incoming.metadata.owner_references;
    next.spec = incoming.spec;
    next.metadata.resource_version += 1;
    if spec_changed {
        next.metadata.generation += 1;
    }
    Ok(next)
}

/// Compute the record that replaces `current` on a status update
pub(crate) fn admit_status_update(
    kind: Kind,
    current: &RawObject,
    incoming: RawObject,
) -> Result<RawObject, StoreError> {
    check_version(kind, current, &incoming)?;

    let mut next = current.clone();
    next.status = incoming.status;
    next.metadata.resource_version += 1;
    Ok(next)
}
