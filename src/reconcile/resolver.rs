//! Tool reference resolution.
//!
//! A tool is a function that already exists; its package supplies the module
//! description and schemas, its request source supplies the channel the agent
//! calls it on.

use crate::api::{Function, Package, ToolReference};
use crate::error::ResolveError;
use crate::store::Client;
use crate::types::ObjectKey;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Everything an agent runtime needs to call one tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolContext {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sink_schema: Option<String>,
    pub request_source: String,
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

pub struct ReferenceResolver<'a> {
    client: &'a Client,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Resolve `tool` as seen from an agent in `namespace`
    pub async fn resolve(
        &self,
        namespace: &str,
        tool: &ToolReference,
    ) -> Result<ToolContext, ResolveError> {
        let function: Function = self
            .client
            .get(&tool.key(namespace))
            .await
            .map_err(|source| ResolveError::Function {
                tool: tool.to_string(),
                source,
            })?;

        let package_name = function.spec.package.clone();
        let package: Package = self
            .client
            .get(&ObjectKey::new(
                function.metadata.namespace.clone(),
                package_name.clone(),
            ))
            .await
            .map_err(|source| ResolveError::Package {
                package: package_name.clone(),
                source,
            })?;

        let module = package
            .spec
            .modules
            .get(&function.spec.module)
            .ok_or_else(|| ResolveError::ModuleNotFound {
                module: function.spec.module.clone(),
                package: package_name.clone(),
            })?;

        let request_source = function
            .spec
            .request_source
            .as_ref()
            .and_then(|source| source.topic())
            .ok_or_else(|| ResolveError::MissingRequestSource(function.metadata.name.clone()))?;

        debug!(
            tool = %tool,
            package = %package_name,
            module = %function.spec.module,
            request_source,
            "Resolved tool"
        );

        Ok(ToolContext {
            description: format!("{}\n{}", function.spec.description, module.description),
            source_schema: non_empty(&module.source_schema),
            sink_schema: non_empty(&module.sink_schema),
            request_source: request_source.to_string(),
        })
    }
}
