//! Agent: the user-authored desired state.

use super::function::{FunctionStatus, SinkSpec, SourceSpec};
use super::ResourceSpec;
use crate::types::{Kind, ObjectKey};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference to a deployed function used as a tool.
///
/// An absent or empty namespace means the referencing agent's namespace.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
}

impl ToolReference {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    pub fn in_namespace(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    pub fn key(&self, default_namespace: &str) -> ObjectKey {
        let namespace = match self.namespace.as_deref() {
            Some(ns) if !ns.is_empty() => ns,
            _ => default_namespace,
        };
        ObjectKey::new(namespace, self.name.clone())
    }
}

impl fmt::Display for ToolReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Model selector, serialized verbatim into the `model` config blob
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    pub model: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub google_api_key: String,
}

/// Jsonnet snippet applied to the agent's response
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostProcessCallback {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub jsonnet: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub instruction: String,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subscription_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_source: Option<SourceSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_source: Option<SourceSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sink: Option<SinkSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_process: Option<PostProcessCallback>,
}

/// Mirror of the derived function's status
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentStatus {
    pub function_status: FunctionStatus,
}

impl From<&FunctionStatus> for AgentStatus {
    fn from(status: &FunctionStatus) -> Self {
        AgentStatus {
            function_status: status.clone(),
        }
    }
}

impl ResourceSpec for AgentSpec {
    const KIND: Kind = Kind::Agent;
}
