//! Typed records: agents, functions and packages.
//!
//! Every record is an [`Object`] of metadata, spec and status. The store only
//! sees the untyped [`RawObject`](crate::store::RawObject) form; the
//! [`Resource`] trait binds a typed object to its [`Kind`].

pub mod agent;
pub mod function;
pub mod meta;
pub mod package;

pub use agent::{AgentSpec, AgentStatus, ModelConfig, PostProcessCallback, ToolReference};
pub use function::{
    FunctionSpec, FunctionStatus, PulsarSinkSpec, PulsarSourceSpec, SinkSpec, SourceSpec,
};
pub use meta::{has_agent_label, set_controller_reference, ObjectMeta, OwnerReference, AGENT_LABEL};
pub use package::{Module, PackageSpec};

use crate::types::{Kind, ObjectKey};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Spec types that identify the kind of the record carrying them
pub trait ResourceSpec:
    Serialize + DeserializeOwned + Clone + PartialEq + Default + Send + Sync + 'static
{
    const KIND: Kind;
}

/// A typed record
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Object<S, St> {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: S,
    #[serde(default)]
    pub status: St,
}

impl<S: Default, St: Default> Object<S, St> {
    pub fn new(metadata: ObjectMeta, spec: S) -> Self {
        Self {
            metadata,
            spec,
            status: St::default(),
        }
    }
}

pub type Agent = Object<AgentSpec, AgentStatus>;
pub type Function = Object<FunctionSpec, FunctionStatus>;
pub type Package = Object<PackageSpec, ()>;

/// Typed view over a stored record
pub trait Resource: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: Kind;

    fn metadata(&self) -> &ObjectMeta;
    fn metadata_mut(&mut self) -> &mut ObjectMeta;

    fn key(&self) -> ObjectKey {
        self.metadata().key()
    }
}

impl<S, St> Resource for Object<S, St>
where
    S: ResourceSpec,
    St: Serialize + DeserializeOwned + Clone + Default + Send + Sync + 'static,
{
    const KIND: Kind = S::KIND;

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}
