//! Sled-backed persistent store.
//!
//! One sled tree per kind, records serialized as JSON. Optimistic concurrency
//! is enforced twice: the resource version check of the admission rules, and a
//! compare-and-swap against the exact bytes that were read, so two processes
//! sharing a database cannot interleave writes either.
//!
//! sled calls block, so every operation runs on the blocking thread pool and
//! flushes before it returns.

use super::{
    admit_create, admit_status_update, admit_update, RawObject, ResourceStore, WatchEvent,
    WatchEventType, WATCH_CHANNEL_CAPACITY,
};
use crate::error::StoreError;
use crate::types::{Kind, ObjectKey};
use async_trait::async_trait;
use sled::{IVec, Tree};
use std::path::Path;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Separates namespace from name in tree keys; sorts below every other byte
const KEY_SEPARATOR: u8 = 0;

#[derive(Clone)]
pub struct SledStore {
    db: sled::Db,
    events: broadcast::Sender<WatchEvent>,
}

/// `namespace \0 name`: byte order matches `ObjectKey` order
fn encode_key(key: &ObjectKey) -> Vec<u8> {
    let mut encoded = namespace_prefix(&key.namespace);
    encoded.extend_from_slice(key.name.as_bytes());
    encoded
}

fn namespace_prefix(namespace: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(namespace.len() + 1);
    prefix.extend_from_slice(namespace.as_bytes());
    prefix.push(KEY_SEPARATOR);
    prefix
}

fn check_key(key: &ObjectKey) -> Result<(), StoreError> {
    if key.namespace.as_bytes().contains(&KEY_SEPARATOR) {
        return Err(StoreError::Backend(format!(
            "namespace of {} contains a NUL byte",
            key
        )));
    }
    Ok(())
}

fn decode(bytes: &[u8]) -> Result<RawObject, StoreError> {
    Ok(serde_json::from_slice(bytes)?)
}

fn encode(object: &RawObject) -> Result<Vec<u8>, StoreError> {
    Ok(serde_json::to_vec(object)?)
}

impl SledStore {
    /// Open (or create) a database at `path`
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(path).map_err(|e| {
            StoreError::Backend(format!(
                "Failed to create store directory {}: {}",
                path.display(),
                e
            ))
        })?;
        let db = sled::open(path)?;
        debug!(path = %path.display(), "Opened sled store");
        Ok(Self::from_db(db))
    }

    pub fn from_db(db: sled::Db) -> Self {
        let (events, _) = broadcast::channel(WATCH_CHANNEL_CAPACITY);
        Self { db, events }
    }

    /// Run `op` on the blocking pool against a handle to this store
    async fn blocking<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(&SledStore) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(|e| StoreError::Backend(format!("sled task failed: {}", e)))?
    }

    fn tree(&self, kind: Kind) -> Result<Tree, StoreError> {
        Ok(self.db.open_tree(kind.as_str())?)
    }

    fn emit(&self, kind: Kind, event_type: WatchEventType, object: RawObject) {
        let _ = self.events.send(WatchEvent {
            kind,
            event_type,
            object,
        });
    }

    fn read_current(
        &self,
        tree: &Tree,
        kind: Kind,
        key: &ObjectKey,
    ) -> Result<(IVec, RawObject), StoreError> {
        let bytes = tree
            .get(encode_key(key))?
            .ok_or_else(|| StoreError::NotFound {
                kind,
                key: key.clone(),
            })?;
        let object = decode(&bytes)?;
        Ok((bytes, object))
    }

    /// Swap `previous` for `next`, reporting a lost race as a conflict
    fn swap(
        &self,
        tree: &Tree,
        kind: Kind,
        previous: &IVec,
        next: &RawObject,
    ) -> Result<(), StoreError> {
        let key = next.key();
        match tree.compare_and_swap(encode_key(&key), Some(previous), Some(encode(next)?))? {
            Ok(()) => Ok(()),
            Err(cas) => {
                let actual = match cas.current {
                    Some(bytes) => decode(&bytes)?.metadata.resource_version,
                    None => {
                        return Err(StoreError::NotFound { kind, key });
                    }
                };
                Err(StoreError::Conflict {
                    kind,
                    key,
                    expected: next.metadata.resource_version - 1,
                    actual,
                })
            }
        }
    }

    /// Every record across all kinds owned by `uid`
    fn dependents_of(&self, uid: &str) -> Result<Vec<(Kind, ObjectKey)>, StoreError> {
        let mut dependents = Vec::new();
        for kind in Kind::ALL {
            for entry in self.tree(kind)?.iter() {
                let (_, bytes) = entry?;
                let object = decode(&bytes)?;
                if object.metadata.is_owned_by(uid) {
                    dependents.push((kind, object.key()));
                }
            }
        }
        Ok(dependents)
    }

    fn get_blocking(&self, kind: Kind, key: &ObjectKey) -> Result<RawObject, StoreError> {
        let tree = self.tree(kind)?;
        self.read_current(&tree, kind, key).map(|(_, object)| object)
    }

    fn list_blocking(&self, kind: Kind, namespace: Option<&str>) -> Result<Vec<RawObject>, StoreError> {
        let tree = self.tree(kind)?;
        let prefix = namespace.map(namespace_prefix).unwrap_or_default();
        tree.scan_prefix(prefix)
            .map(|entry| {
                let (_, bytes) = entry?;
                decode(&bytes)
            })
            .collect()
    }

    fn create_blocking(&self, kind: Kind, object: RawObject) -> Result<RawObject, StoreError> {
        let tree = self.tree(kind)?;
        let key = object.key();
        check_key(&key)?;
        let created = admit_create(object);

        let swapped = tree.compare_and_swap(
            encode_key(&key),
            None as Option<&[u8]>,
            Some(encode(&created)?),
        )?;
        if swapped.is_err() {
            return Err(StoreError::AlreadyExists { kind, key });
        }
        self.db.flush()?;

        trace!(kind = %kind, key = %key, "Created record");
        self.emit(kind, WatchEventType::Added, created.clone());
        Ok(created)
    }

    fn update_blocking(&self, kind: Kind, object: RawObject) -> Result<RawObject, StoreError> {
        let tree = self.tree(kind)?;
        let (previous, current) = self.read_current(&tree, kind, &object.key())?;
        let updated = admit_update(kind, &current, object)?;
        self.swap(&tree, kind, &previous, &updated)?;
        self.db.flush()?;

        trace!(kind = %kind, key = %updated.key(), version = updated.metadata.resource_version, "Updated record");
        self.emit(kind, WatchEventType::Modified, updated.clone());
        Ok(updated)
    }

    fn update_status_blocking(&self, kind: Kind, object: RawObject) -> Result<RawObject, StoreError> {
        let tree = self.tree(kind)?;
        let (previous, current) = self.read_current(&tree, kind, &object.key())?;
        let updated = admit_status_update(kind, &current, object)?;
        self.swap(&tree, kind, &previous, &updated)?;
        self.db.flush()?;

        trace!(kind = %kind, key = %updated.key(), "Updated record status");
        self.emit(kind, WatchEventType::Modified, updated.clone());
        Ok(updated)
    }

    fn delete_blocking(&self, kind: Kind, key: &ObjectKey) -> Result<(), StoreError> {
        let root = self.tree(kind)?;
        if !root.contains_key(encode_key(key))? {
            return Err(StoreError::NotFound {
                kind,
                key: key.clone(),
            });
        }

        let mut pending = vec![(kind, key.clone())];
        while let Some((kind, key)) = pending.pop() {
            let Some(bytes) = self.tree(kind)?.remove(encode_key(&key))? else {
                continue;
            };
            let object = decode(&bytes)?;
            pending.extend(self.dependents_of(&object.metadata.uid)?);
            trace!(kind = %kind, key = %key, "Deleted record");
            self.emit(kind, WatchEventType::Deleted, object);
        }
        self.db.flush()?;
        Ok(())
    }
}

#[async_trait]
impl ResourceStore for SledStore {
    async fn get(&self, kind: Kind, key: &ObjectKey) -> Result<RawObject, StoreError> {
        let key = key.clone();
        self.blocking(move |store| store.get_blocking(kind, &key)).await
    }

    async fn list(&self, kind: Kind, namespace: Option<&str>) -> Result<Vec<RawObject>, StoreError> {
        let namespace = namespace.map(str::to_string);
        self.blocking(move |store| store.list_blocking(kind, namespace.as_deref()))
            .await
    }

    async fn create(&self, kind: Kind, object: RawObject) -> Result<RawObject, StoreError> {
        self.blocking(move |store| store.create_blocking(kind, object)).await
    }

    async fn update(&self, kind: Kind, object: RawObject) -> Result<RawObject, StoreError> {
        self.blocking(move |store| store.update_blocking(kind, object)).await
    }

    async fn update_status(&self, kind: Kind, object: RawObject) -> Result<RawObject, StoreError> {
        self.blocking(move |store| store.update_status_blocking(kind, object))
            .await
    }

    async fn delete(&self, kind: Kind, key: &ObjectKey) -> Result<(), StoreError> {
        let key = key.clone();
        self.blocking(move |store| store.delete_blocking(kind, &key)).await
    }

    fn watch(&self) -> broadcast::Receiver<WatchEvent> {
        self.events.subscribe()
    }
}
