//! Typed client over a [`ResourceStore`].
//!
//! A client may carry a deadline; every store call made through it returns
//! [`StoreError::Timeout`] once the deadline has passed instead of waiting.

use super::{RawObject, ResourceStore, WatchEvent};
use crate::api::Resource;
use crate::error::StoreError;
use crate::types::{Kind, ObjectKey};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

#[derive(Clone)]
pub struct Client {
    store: Arc<dyn ResourceStore>,
    deadline: Option<Instant>,
}

impl Client {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self {
            store,
            deadline: None,
        }
    }

    /// A client whose calls give up at `deadline`
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        Self {
            store: Arc::clone(&self.store),
            deadline: Some(deadline),
        }
    }

    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn store(&self) -> &Arc<dyn ResourceStore> {
        &self.store
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, call)
                .await
                .map_err(|_| StoreError::Timeout)?,
            None => call.await,
        }
    }

    pub async fn get<R: Resource>(&self, key: &ObjectKey) -> Result<R, StoreError> {
        self.bounded(self.store.get(R::KIND, key)).await?.into_resource()
    }

    pub async fn list<R: Resource>(&self, namespace: Option<&str>) -> Result<Vec<R>, StoreError> {
        self.bounded(self.store.list(R::KIND, namespace))
            .await?
            .into_iter()
            .map(RawObject::into_resource)
            .collect()
    }

    pub async fn create<R: Resource>(&self, resource: &R) -> Result<R, StoreError> {
        let raw = RawObject::from_resource(resource)?;
        self.bounded(self.store.create(R::KIND, raw)).await?.into_resource()
    }

    pub async fn update<R: Resource>(&self, resource: &R) -> Result<R, StoreError> {
        let raw = RawObject::from_resource(resource)?;
        self.bounded(self.store.update(R::KIND, raw)).await?.into_resource()
    }

    pub async fn update_status<R: Resource>(&self, resource: &R) -> Result<R, StoreError> {
        let raw = RawObject::from_resource(resource)?;
        self.bounded(self.store.update_status(R::KIND, raw))
            .await?
            .into_resource()
    }

    pub async fn delete<R: Resource>(&self, key: &ObjectKey) -> Result<(), StoreError> {
        self.bounded(self.store.delete(R::KIND, key)).await
    }

    /// Create `object`, or overwrite the spec and labels of the stored record.
    ///
    /// Status on the incoming object is ignored for existing records and
    /// written through the status path for new ones.
    pub async fn apply(&self, kind: Kind, object: RawObject) -> Result<RawObject, StoreError> {
        match self.bounded(self.store.get(kind, &object.key())).await {
            Ok(current) => {
                if current.spec == object.spec && current.metadata.labels == object.metadata.labels {
                    return Ok(current);
                }
                let mut next = current;
                next.spec = object.spec;
                next.metadata.labels = object.metadata.labels;
                self.bounded(self.store.update(kind, next)).await
            }
            Err(err) if err.is_not_found() => {
                let status = object.status.clone();
                let created = self.bounded(self.store.create(kind, object)).await?;
                if status.is_null() {
                    return Ok(created);
                }
                let mut with_status = created;
                with_status.status = status;
                self.bounded(self.store.update_status(kind, with_status)).await
            }
            Err(err) => Err(err),
        }
    }

    pub fn watch(&self) -> broadcast::Receiver<WatchEvent> {
        self.store.watch()
    }
}
