//! Fixtures shared by unit and integration tests.

use crate::api::{
    Agent, AgentSpec, Function, FunctionSpec, Module, ObjectMeta, Package, PackageSpec, SourceSpec,
};
use crate::error::StoreError;
use crate::reconcile::PulsarRpcConfig;
use crate::store::{Client, MemoryStore, RawObject, ResourceStore, WatchEvent};
use crate::types::{Kind, ObjectKey};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

pub fn memory_client() -> Client {
    Client::new(Arc::new(MemoryStore::new()))
}

pub fn agent(namespace: &str, name: &str) -> Agent {
    Agent::new(
        ObjectMeta::new(namespace, name),
        AgentSpec {
            description: format!("{} agent", name),
            instruction: "You are a helpful assistant".to_string(),
            ..Default::default()
        },
    )
}

pub fn package(namespace: &str, name: &str, modules: &[(&str, Module)]) -> Package {
    Package::new(
        ObjectMeta::new(namespace, name),
        PackageSpec {
            modules: modules
                .iter()
                .map(|(module, descriptor)| (module.to_string(), descriptor.clone()))
                .collect(),
            ..Default::default()
        },
    )
}

/// A deployed function usable as a tool; described as "<name> tool"
pub fn tool_function(
    namespace: &str,
    name: &str,
    package: &str,
    module: &str,
    request_topic: Option<&str>,
) -> Function {
    Function::new(
        ObjectMeta::new(namespace, name),
        FunctionSpec {
            description: format!("{} tool", name),
            package: package.to_string(),
            module: module.to_string(),
            request_source: request_topic.map(SourceSpec::pulsar),
            ..Default::default()
        },
    )
}

pub fn pulsar_config() -> PulsarRpcConfig {
    PulsarRpcConfig {
        service_url: "pulsar://test:6650".to_string(),
        auth_plugin: String::new(),
        auth_params: String::new(),
    }
}

/// Store wrapper that counts successful writes
pub struct CountingStore {
    inner: Arc<dyn ResourceStore>,
    writes: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: Arc<dyn ResourceStore>) -> Self {
        Self {
            inner,
            writes: AtomicUsize::new(0),
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.writes.store(0, Ordering::SeqCst);
    }

    fn count<T>(&self, result: Result<T, StoreError>) -> Result<T, StoreError> {
        if result.is_ok() {
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
        result
    }
}

#[async_trait]
impl ResourceStore for CountingStore {
    async fn get(&self, kind: Kind, key: &ObjectKey) -> Result<RawObject, StoreError> {
        self.inner.get(kind, key).await
    }

    async fn list(&self, kind: Kind, namespace: Option<&str>) -> Result<Vec<RawObject>, StoreError> {
        self.inner.list(kind, namespace).await
    }

    async fn create(&self, kind: Kind, object: RawObject) -> Result<RawObject, StoreError> {
        let result = self.inner.create(kind, object).await;
        self.count(result)
    }

    async fn update(&self, kind: Kind, object: RawObject) -> Result<RawObject, StoreError> {
        let result = self.inner.update(kind, object).await;
        self.count(result)
    }

    async fn update_status(&self, kind: Kind, object: RawObject) -> Result<RawObject, StoreError> {
        let result = self.inner.update_status(kind, object).await;
        self.count(result)
    }

    async fn delete(&self, kind: Kind, key: &ObjectKey) -> Result<(), StoreError> {
        let result = self.inner.delete(kind, key).await;
        self.count(result)
    }

    fn watch(&self) -> broadcast::Receiver<WatchEvent> {
        self.inner.watch()
    }
}
