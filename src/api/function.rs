//! Function: the executable record derived from an agent, also the unit a tool points at.

use super::ResourceSpec;
use crate::types::Kind;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Config blob keys written onto every derived function
pub const CONFIG_MODEL: &str = "model";
pub const CONFIG_PULSAR_RPC: &str = "pulsarRpc";
pub const CONFIG_RESPONSE_SOURCE: &str = "responseSource";
pub const CONFIG_AGENT: &str = "agent";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PulsarSourceSpec {
    #[serde(default)]
    pub topic: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PulsarSinkSpec {
    #[serde(default)]
    pub topic: String,
}

/// Message source; only the pulsar transport exists today
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pulsar: Option<PulsarSourceSpec>,
}

impl SourceSpec {
    pub fn pulsar(topic: impl Into<String>) -> Self {
        Self {
            pulsar: Some(PulsarSourceSpec {
                topic: topic.into(),
            }),
        }
    }

    /// Channel address, present only when a transport with a non-empty topic is set
    pub fn topic(&self) -> Option<&str> {
        self.pulsar
            .as_ref()
            .map(|p| p.topic.as_str())
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SinkSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pulsar: Option<PulsarSinkSpec>,
}

impl SinkSpec {
    pub fn pulsar(topic: impl Into<String>) -> Self {
        Self {
            pulsar: Some(PulsarSinkSpec {
                topic: topic.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub package: String,
    pub module: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subscription_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_source: Option<SourceSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sink: Option<SinkSpec>,
    /// Named JSON documents handed to the runtime
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, Value>,
}

/// Written by the runtime executing the function
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FunctionStatus {
    pub replicas: i32,
    pub ready_replicas: i32,
    pub available_replicas: i32,
    pub updated_replicas: i32,
    pub observed_generation: i64,
}

impl ResourceSpec for FunctionSpec {
    const KIND: Kind = Kind::Function;
}
