//! Configuration composition: the named JSON documents handed to the agent runtime.

use super::normalize::normalize_agent_name;
use super::resolver::{ReferenceResolver, ToolContext};
use crate::api::function::{CONFIG_AGENT, CONFIG_MODEL, CONFIG_PULSAR_RPC, CONFIG_RESPONSE_SOURCE};
use crate::api::Agent;
use crate::error::ReconcileError;
use crate::store::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Process-wide transport connection parameters injected into every `pulsarRpc` blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulsarRpcConfig {
    pub service_url: String,
    pub auth_plugin: String,
    pub auth_params: String,
}

impl Default for PulsarRpcConfig {
    fn default() -> Self {
        Self {
            service_url: "pulsar://localhost:6650".to_string(),
            auth_plugin: String::new(),
            auth_params: String::new(),
        }
    }
}

impl PulsarRpcConfig {
    fn to_blob(&self) -> Value {
        json!({
            "serviceUrl": self.service_url,
            "authPlugin": self.auth_plugin,
            "authParams": self.auth_params,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessCallback {
    pub jsonnet: String,
}

/// Contents of the `agent` config blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentContext {
    pub name: String,
    pub description: String,
    pub instruction: String,
    /// Keyed by tool name; absent when the agent has no tools
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<BTreeMap<String, ToolContext>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_process: Option<ProcessCallback>,
}

pub struct ConfigComposer<'a> {
    client: &'a Client,
    pulsar: &'a PulsarRpcConfig,
}

impl<'a> ConfigComposer<'a> {
    pub fn new(client: &'a Client, pulsar: &'a PulsarRpcConfig) -> Self {
        Self { client, pulsar }
    }

    /// Build every config blob of the derived function, stopping at the first failure
    pub async fn compose(&self, agent: &Agent) -> Result<BTreeMap<String, Value>, ReconcileError> {
        let wrap = |blob: &'static str| {
            let agent = agent.metadata.name.clone();
            move |source: ReconcileError| ReconcileError::Compose {
                agent,
                blob,
                source: Box::new(source),
            }
        };

        let mut config = BTreeMap::new();

        let model = serde_json::to_value(&agent.spec.model)
            .map_err(|e| wrap(CONFIG_MODEL)(e.into()))?;
        config.insert(CONFIG_MODEL.to_string(), model);

        config.insert(CONFIG_PULSAR_RPC.to_string(), self.pulsar.to_blob());

        let response_source = serde_json::to_value(&agent.spec.response_source)
            .map_err(|e| wrap(CONFIG_RESPONSE_SOURCE)(e.into()))?;
        config.insert(CONFIG_RESPONSE_SOURCE.to_string(), response_source);

        let agent_context = self
            .build_agent_context(agent)
            .await
            .map_err(wrap(CONFIG_AGENT))?;
        let agent_context =
            serde_json::to_value(&agent_context).map_err(|e| wrap(CONFIG_AGENT)(e.into()))?;
        config.insert(CONFIG_AGENT.to_string(), agent_context);

        Ok(config)
    }

    pub async fn build_agent_context(&self, agent: &Agent) -> Result<AgentContext, ReconcileError> {
        let resolver = ReferenceResolver::new(self.client);
        let mut tools: Option<BTreeMap<String, ToolContext>> = None;

        for tool in &agent.spec.tools {
            let context = resolver
                .resolve(&agent.metadata.namespace, tool)
                .await
                .map_err(|source| ReconcileError::ToolResolution {
                    tool: tool.to_string(),
                    source,
                })?;
            // Same-named tools from different namespaces: the later reference wins.
            tools
                .get_or_insert_with(BTreeMap::new)
                .insert(tool.name.clone(), context);
        }

        debug!(
            agent = %agent.metadata.key(),
            tools = tools.as_ref().map_or(0, |t| t.len()),
            "Built agent context"
        );

        // Record name, not display name.
        Ok(AgentContext {
            name: normalize_agent_name(&agent.metadata.name),
            description: agent.spec.description.clone(),
            instruction: agent.spec.instruction.clone(),
            tools,
            post_process: agent.spec.post_process.as_ref().map(|callback| ProcessCallback {
                jsonnet: callback.jsonnet.clone(),
            }),
        })
    }
}
