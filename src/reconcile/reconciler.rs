//! Agent reconciler
//!
//! One invocation reads the agent, rebuilds the function it should own, writes
//! the function only when its spec or labels drifted, and mirrors the
//! function's status back onto the agent. Every step recomputes from fresh
//! reads, so the invocation can be repeated any number of times; a second run
//! without intervening changes performs no writes.

use super::composer::{ConfigComposer, PulsarRpcConfig};
use crate::api::{
    set_controller_reference, Agent, AgentSpec, AgentStatus, Function, FunctionSpec, ObjectMeta,
    Resource, AGENT_LABEL,
};
use crate::error::ReconcileError;
use crate::store::Client;
use crate::types::ObjectKey;
use std::collections::BTreeMap;
use tokio::time::Instant;
use tracing::{debug, info};

/// Package and module that run every agent
pub const AGENT_PACKAGE_NAME: &str = "agent";
pub const AGENT_MODULE_NAME: &str = "agent";

/// What happened to the derived function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionAction {
    Created,
    Updated,
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The agent no longer exists; nothing to do
    AgentNotFound,
    Synced {
        function: FunctionAction,
        status_updated: bool,
    },
}

impl ReconcileOutcome {
    pub fn writes(&self) -> usize {
        match self {
            ReconcileOutcome::AgentNotFound => 0,
            ReconcileOutcome::Synced {
                function,
                status_updated,
            } => {
                usize::from(*function != FunctionAction::Unchanged) + usize::from(*status_updated)
            }
        }
    }
}

/// A response source, when declared, must name a transport with a non-empty topic
pub fn validate_response_source(spec: &AgentSpec) -> Result<(), ReconcileError> {
    match &spec.response_source {
        Some(source) if source.topic().is_none() => Err(ReconcileError::Validation(
            "ResponseSource is set but Pulsar is nil or Topic is empty".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Derived function for `agent`, without the config blobs' side of ownership
pub fn build_function(agent: &Agent, config: BTreeMap<String, serde_json::Value>) -> Function {
    let mut metadata = ObjectMeta::new(agent.metadata.namespace.clone(), agent.metadata.name.clone());
    metadata
        .labels
        .insert(AGENT_LABEL.to_string(), agent.metadata.name.clone());

    Function::new(
        metadata,
        FunctionSpec {
            display_name: agent.spec.display_name.clone(),
            description: agent.spec.description.clone(),
            package: AGENT_PACKAGE_NAME.to_string(),
            module: AGENT_MODULE_NAME.to_string(),
            subscription_name: agent.spec.subscription_name.clone(),
            sources: agent.spec.sources.clone(),
            request_source: agent.spec.request_source.clone(),
            sink: agent.spec.sink.clone(),
            config,
        },
    )
}

/// Whether the stored function differs from the intended one in anything the reconciler owns
pub fn function_drifted(existing: &Function, intended: &Function) -> bool {
    existing.spec != intended.spec || existing.metadata.labels != intended.metadata.labels
}

pub struct AgentReconciler {
    client: Client,
    pulsar: PulsarRpcConfig,
}

impl AgentReconciler {
    pub fn new(client: Client, pulsar: PulsarRpcConfig) -> Self {
        Self { client, pulsar }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Reconcile the agent at `key`; store calls give up at `deadline`
    pub async fn reconcile(
        &self,
        key: &ObjectKey,
        deadline: Option<Instant>,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let client = match deadline {
            Some(deadline) => self.client.with_deadline(deadline),
            None => self.client.clone(),
        };
        info!(agent = %key, "Reconciling Agent");

        let mut agent: Agent = match client.get(key).await {
            Ok(agent) => agent,
            Err(err) if err.is_not_found() => {
                debug!(agent = %key, "Agent not found, nothing to reconcile");
                return Ok(ReconcileOutcome::AgentNotFound);
            }
            Err(err) => return Err(err.into()),
        };

        validate_response_source(&agent.spec)?;

        let config = ConfigComposer::new(&client, &self.pulsar)
            .compose(&agent)
            .await?;

        let mut intended = build_function(&agent, config);
        set_controller_reference(Agent::KIND, &agent.metadata, intended.metadata_mut())?;

        let function = match client.get::<Function>(key).await {
            Ok(mut existing) => {
                let owners = existing.metadata.owner_references.clone();
                set_controller_reference(Agent::KIND, &agent.metadata, existing.metadata_mut())?;
                if function_drifted(&existing, &intended)
                    || existing.metadata.owner_references != owners
                {
                    existing.spec = intended.spec;
                    existing.metadata.labels = intended.metadata.labels;
                    client.update(&existing).await?;
                    debug!(agent = %key, "Updated Function");
                    FunctionAction::Updated
                } else {
                    FunctionAction::Unchanged
                }
            }
            Err(err) if err.is_not_found() => {
                client.create(&intended).await?;
                debug!(agent = %key, "Created Function");
                FunctionAction::Created
            }
            Err(err) => return Err(err.into()),
        };

        // Re-read so the status written by the function's runtime is current.
        let observed: Function = client.get(key).await?;
        let status = AgentStatus::from(&observed.status);
        let status_updated = if agent.status != status {
            agent.status = status;
            client.update_status(&agent).await?;
            debug!(agent = %key, "Mirrored Function status onto Agent");
            true
        } else {
            false
        };

        Ok(ReconcileOutcome::Synced {
            function,
            status_updated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{FunctionStatus, SourceSpec, ToolReference};
    use crate::test_support::{agent, memory_client, pulsar_config};

    fn reconciler(client: &Client) -> AgentReconciler {
        AgentReconciler::new(client.clone(), pulsar_config())
    }

    #[tokio::test]
    async fn test_missing_agent_is_success() {
        let client = memory_client();
        let outcome = reconciler(&client)
            .reconcile(&ObjectKey::new("default", "non-existent-agent"), None)
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::AgentNotFound);
        assert_eq!(outcome.writes(), 0);
    }

    #[tokio::test]
    async fn test_creates_owned_function() {
        let client = memory_client();
        let mut desired = agent("default", "test-agent");
        desired.spec.display_name = "Test Agent".to_string();
        desired.spec.subscription_name = "sub".to_string();
        desired.spec.request_source = Some(SourceSpec::pulsar("request-topic"));
        let desired = client.create(&desired).await.unwrap();

        let outcome = reconciler(&client)
            .reconcile(&desired.key(), None)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Synced {
                function: FunctionAction::Created,
                status_updated: false,
            }
        );

        let function: Function = client.get(&desired.key()).await.unwrap();
        assert_eq!(function.metadata.name, "test-agent");
        assert_eq!(function.metadata.namespace, "default");
        assert_eq!(function.spec.package, AGENT_PACKAGE_NAME);
        assert_eq!(function.spec.module, AGENT_MODULE_NAME);
        assert_eq!(function.spec.display_name, "Test Agent");
        assert_eq!(function.spec.subscription_name, "sub");
        assert_eq!(function.spec.request_source, Some(SourceSpec::pulsar("request-topic")));
        assert_eq!(function.metadata.labels[AGENT_LABEL], "test-agent");
        assert!(function.metadata.is_owned_by(&desired.metadata.uid));
        for blob in ["model", "pulsarRpc", "responseSource", "agent"] {
            assert!(function.spec.config.contains_key(blob), "missing {blob}");
        }
    }

    #[tokio::test]
    async fn test_second_pass_is_a_no_op() {
        let client = memory_client();
        let desired = client.create(&agent("default", "a")).await.unwrap();
        let reconciler = reconciler(&client);

        reconciler.reconcile(&desired.key(), None).await.unwrap();
        let outcome = reconciler.reconcile(&desired.key(), None).await.unwrap();
        assert_eq!(outcome.writes(), 0);
    }

    #[tokio::test]
    async fn test_spec_change_updates_function() {
        let client = memory_client();
        let desired = client.create(&agent("default", "a")).await.unwrap();
        let reconciler = reconciler(&client);
        reconciler.reconcile(&desired.key(), None).await.unwrap();

        let mut changed: Agent = client.get(&desired.key()).await.unwrap();
        changed.spec.instruction = "new instruction".to_string();
        client.update(&changed).await.unwrap();

        let outcome = reconciler.reconcile(&desired.key(), None).await.unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Synced {
                function: FunctionAction::Updated,
                status_updated: false,
            }
        );
        let function: Function = client.get(&desired.key()).await.unwrap();
        assert_eq!(function.spec.config["agent"]["instruction"], "new instruction");
    }

    #[tokio::test]
    async fn test_removed_label_is_restored() {
        let client = memory_client();
        let desired = client.create(&agent("default", "a")).await.unwrap();
        let reconciler = reconciler(&client);
        reconciler.reconcile(&desired.key(), None).await.unwrap();

        let mut function: Function = client.get(&desired.key()).await.unwrap();
        function.metadata.labels.clear();
        client.update(&function).await.unwrap();

        let outcome = reconciler.reconcile(&desired.key(), None).await.unwrap();
        assert_eq!(outcome.writes(), 1);
        let function: Function = client.get(&desired.key()).await.unwrap();
        assert_eq!(function.metadata.labels[AGENT_LABEL], "a");
    }

    #[tokio::test]
    async fn test_function_status_is_mirrored() {
        let client = memory_client();
        let desired = client.create(&agent("default", "a")).await.unwrap();
        let reconciler = reconciler(&client);
        reconciler.reconcile(&desired.key(), None).await.unwrap();

        let mut function: Function = client.get(&desired.key()).await.unwrap();
        function.status = FunctionStatus {
            replicas: 2,
            ready_replicas: 1,
            available_replicas: 1,
            updated_replicas: 2,
            observed_generation: 1,
        };
        client.update_status(&function).await.unwrap();

        let outcome = reconciler.reconcile(&desired.key(), None).await.unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Synced {
                function: FunctionAction::Unchanged,
                status_updated: true,
            }
        );
        let mirrored: Agent = client.get(&desired.key()).await.unwrap();
        assert_eq!(mirrored.status.function_status, function.status);
        assert_eq!(reconciler.reconcile(&desired.key(), None).await.unwrap().writes(), 0);
    }

    #[tokio::test]
    async fn test_invalid_response_source_writes_nothing() {
        for response_source in [SourceSpec::default(), SourceSpec::pulsar("")] {
            let client = memory_client();
            let mut desired = agent("default", "test-agent-nil-pulsar");
            desired.spec.response_source = Some(response_source);
            let desired = client.create(&desired).await.unwrap();

            let err = reconciler(&client)
                .reconcile(&desired.key(), None)
                .await
                .unwrap_err();
            assert!(err.is_validation());
            assert!(err.to_string().contains(
                "invalid ResponseSource configuration: ResponseSource is set but Pulsar is nil or Topic is empty"
            ));
            assert!(client
                .get::<Function>(&desired.key())
                .await
                .unwrap_err()
                .is_not_found());
        }
    }

    #[tokio::test]
    async fn test_unresolvable_tool_leaves_function_untouched() {
        let client = memory_client();
        let desired = client.create(&agent("default", "a")).await.unwrap();
        let reconciler = reconciler(&client);
        reconciler.reconcile(&desired.key(), None).await.unwrap();
        let before: Function = client.get(&desired.key()).await.unwrap();

        let mut changed: Agent = client.get(&desired.key()).await.unwrap();
        changed.spec.tools = vec![ToolReference::new("missing")];
        client.update(&changed).await.unwrap();

        let err = reconciler.reconcile(&desired.key(), None).await.unwrap_err();
        assert!(!err.is_conflict());
        assert!(err.to_string().contains("failed to build tool context for missing"));
        let after: Function = client.get(&desired.key()).await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_function_controlled_by_another_owner_is_rejected() {
        let client = memory_client();
        let desired = client.create(&agent("default", "a")).await.unwrap();

        let mut foreign = build_function(&desired, BTreeMap::new());
        let other_owner = ObjectMeta {
            uid: "someone-else".to_string(),
            ..ObjectMeta::new("default", "other")
        };
        set_controller_reference(Agent::KIND, &other_owner, foreign.metadata_mut()).unwrap();
        client.create(&foreign).await.unwrap();

        let err = reconciler(&client)
            .reconcile(&desired.key(), None)
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "OwnershipConflict");
    }
}
