//! In-process store backed by an ordered map.

use super::{
    admit_create, admit_status_update, admit_update, RawObject, ResourceStore, WatchEvent,
    WatchEventType, WATCH_CHANNEL_CAPACITY,
};
use crate::error::StoreError;
use crate::types::{Kind, ObjectKey};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tokio::sync::broadcast;
use tracing::trace;

type Records = BTreeMap<(Kind, ObjectKey), RawObject>;

pub struct MemoryStore {
    records: RwLock<Records>,
    events: broadcast::Sender<WatchEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(WATCH_CHANNEL_CAPACITY);
        Self {
            records: RwLock::new(BTreeMap::new()),
            events,
        }
    }

    /// Called after the write lock is released, so events from concurrent
    /// writers may arrive out of write order. Watchers re-read the record
    /// instead of trusting the event payload.
    fn emit(&self, kind: Kind, event_type: WatchEventType, object: RawObject) {
        // No receivers is fine; nobody is watching yet.
        let _ = self.events.send(WatchEvent {
            kind,
            event_type,
            object,
        });
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Remove `root` and everything it transitively owns, returning the removed records
fn remove_cascading(records: &mut Records, kind: Kind, key: &ObjectKey) -> Vec<(Kind, RawObject)> {
    let mut removed = Vec::new();
    let mut pending = vec![(kind, key.clone())];

    while let Some((kind, key)) = pending.pop() {
        let Some(object) = records.remove(&(kind, key)) else {
            continue;
        };
        let uid = object.metadata.uid.clone();
        pending.extend(
            records
                .iter()
                .filter(|(_, dependent)| dependent.metadata.is_owned_by(&uid))
                .map(|((k, dependent_key), _)| (*k, dependent_key.clone())),
        );
        removed.push((kind, object));
    }

    removed
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn get(&self, kind: Kind, key: &ObjectKey) -> Result<RawObject, StoreError> {
        self.records
            .read()
            .get(&(kind, key.clone()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind,
                key: key.clone(),
            })
    }

    async fn list(&self, kind: Kind, namespace: Option<&str>) -> Result<Vec<RawObject>, StoreError> {
        Ok(self
            .records
            .read()
            .iter()
            .filter(|((k, key), _)| {
                *k == kind && namespace.map_or(true, |ns| key.namespace == ns)
            })
            .map(|(_, object)| object.clone())
            .collect())
    }

    async fn create(&self, kind: Kind, object: RawObject) -> Result<RawObject, StoreError> {
        let key = object.key();
        let created = {
            let mut records = self.records.write();
            if records.contains_key(&(kind, key.clone())) {
                return Err(StoreError::AlreadyExists { kind, key });
            }
            let created = admit_create(object);
            records.insert((kind, key.clone()), created.clone());
            created
        };

        trace!(kind = %kind, key = %key, "Created record");
        self.emit(kind, WatchEventType::Added, created.clone());
        Ok(created)
    }

    async fn update(&self, kind: Kind, object: RawObject) -> Result<RawObject, StoreError> {
        let key = object.key();
        let updated = {
            let mut records = self.records.write();
            let current = records
                .get(&(kind, key.clone()))
                .ok_or_else(|| StoreError::NotFound {
                    kind,
                    key: key.clone(),
                })?;
            let updated = admit_update(kind, current, object)?;
            records.insert((kind, key.clone()), updated.clone());
            updated
        };

        trace!(kind = %kind, key = %key, version = updated.metadata.resource_version, "Updated record");
        self.emit(kind, WatchEventType::Modified, updated.clone());
        Ok(updated)
    }

    async fn update_status(&self, kind: Kind, object: RawObject) -> Result<RawObject, StoreError> {
        let key = object.key();
        let updated = {
            let mut records = self.records.write();
            let current = records
                .get(&(kind, key.clone()))
                .ok_or_else(|| StoreError::NotFound {
                    kind,
                    key: key.clone(),
                })?;
            let updated = admit_status_update(kind, current, object)?;
            records.insert((kind, key.clone()), updated.clone());
            updated
        };

        trace!(kind = %kind, key = %key, "Updated record status");
        self.emit(kind, WatchEventType::Modified, updated.clone());
        Ok(updated)
    }

    async fn delete(&self, kind: Kind, key: &ObjectKey) -> Result<(), StoreError> {
        let removed = {
            let mut records = self.records.write();
            if !records.contains_key(&(kind, key.clone())) {
                return Err(StoreError::NotFound {
                    kind,
                    key: key.clone(),
                });
            }
            remove_cascading(&mut records, kind, key)
        };

        for (kind, object) in removed {
            trace!(kind = %kind, key = %object.key(), "Deleted record");
            self.emit(kind, WatchEventType::Deleted, object);
        }
        Ok(())
    }

    fn watch(&self) -> broadcast::Receiver<WatchEvent> {
        self.events.subscribe()
    }
}
