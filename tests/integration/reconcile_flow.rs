use std::sync::Arc;

use agent_operator::api::{Agent, Function, Module, SourceSpec, ToolReference, AGENT_LABEL};
use agent_operator::reconcile::{AgentReconciler, FunctionAction, ReconcileOutcome};
use agent_operator::store::{Client, MemoryStore};
use agent_operator::test_support::{agent, package, pulsar_config, tool_function, CountingStore};
use agent_operator::types::ObjectKey;

fn counting_client() -> (Client, Arc<CountingStore>) {
    let store = Arc::new(CountingStore::new(Arc::new(MemoryStore::new())));
    (Client::new(store.clone()), store)
}

async fn seed_tools(client: &Client) {
    let module = |description: &str, schema: &str| Module {
        description: description.to_string(),
        source_schema: schema.to_string(),
        ..Default::default()
    };
    client
        .create(&package(
            "default",
            "toolbox",
            &[
                ("search", module("Searches the web", "{\"type\":\"string\"}")),
                ("weather", module("Reports the weather", "")),
            ],
        ))
        .await
        .unwrap();
    client
        .create(&tool_function("default", "search", "toolbox", "search", Some("search-requests")))
        .await
        .unwrap();
    client
        .create(&tool_function("default", "weather", "toolbox", "weather", Some("weather-requests")))
        .await
        .unwrap();
}

fn agent_with_tools(name: &str) -> Agent {
    let mut desired = agent("default", name);
    desired.spec.tools = vec![ToolReference::new("search"), ToolReference::new("weather")];
    desired
}

#[tokio::test]
async fn two_resolvable_tools_produce_a_two_entry_tool_map() {
    let (client, _) = counting_client();
    seed_tools(&client).await;
    let desired = client.create(&agent_with_tools("assistant")).await.unwrap();

    AgentReconciler::new(client.clone(), pulsar_config())
        .reconcile(&desired.metadata.key(), None)
        .await
        .unwrap();

    let function: Function = client.get(&desired.metadata.key()).await.unwrap();
    let tools = function.spec.config["agent"]["tools"].as_object().unwrap();
    assert_eq!(tools.len(), 2);
    assert_eq!(
        tools["search"]["description"],
        "search tool\nSearches the web"
    );
    assert_eq!(tools["search"]["sourceSchema"], "{\"type\":\"string\"}");
    assert_eq!(tools["search"]["requestSource"], "search-requests");
    assert_eq!(tools["weather"]["requestSource"], "weather-requests");
    assert!(tools["weather"].get("sourceSchema").is_none());
    assert_eq!(function.spec.config["pulsarRpc"]["serviceUrl"], "pulsar://test:6650");
}

#[tokio::test]
async fn second_pass_issues_zero_writes() {
    let (client, store) = counting_client();
    seed_tools(&client).await;
    let desired = client.create(&agent_with_tools("assistant")).await.unwrap();
    let reconciler = AgentReconciler::new(client.clone(), pulsar_config());

    store.reset();
    reconciler.reconcile(&desired.metadata.key(), None).await.unwrap();
    assert_eq!(store.writes(), 1);

    store.reset();
    let outcome = reconciler.reconcile(&desired.metadata.key(), None).await.unwrap();
    assert_eq!(
        outcome,
        ReconcileOutcome::Synced {
            function: FunctionAction::Unchanged,
            status_updated: false,
        }
    );
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn invalid_response_source_writes_nothing() {
    let (client, store) = counting_client();
    let mut desired = agent("default", "test-agent-empty-topic");
    desired.spec.response_source = Some(SourceSpec::pulsar(""));
    let desired = client.create(&desired).await.unwrap();

    store.reset();
    let err = AgentReconciler::new(client.clone(), pulsar_config())
        .reconcile(&desired.metadata.key(), None)
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert_eq!(store.writes(), 0);
    assert!(client
        .get::<Function>(&desired.metadata.key())
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn missing_tool_leaves_the_function_unmodified() {
    let (client, store) = counting_client();
    seed_tools(&client).await;
    let desired = client.create(&agent_with_tools("assistant")).await.unwrap();
    let reconciler = AgentReconciler::new(client.clone(), pulsar_config());
    reconciler.reconcile(&desired.metadata.key(), None).await.unwrap();
    let before: Function = client.get(&desired.metadata.key()).await.unwrap();

    client
        .delete::<Function>(&ObjectKey::new("default", "weather"))
        .await
        .unwrap();

    store.reset();
    let err = reconciler
        .reconcile(&desired.metadata.key(), None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("failed to build tool context for weather"));
    assert_eq!(store.writes(), 0);

    let after: Function = client.get(&desired.metadata.key()).await.unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn nonexistent_agent_succeeds_without_writes() {
    let (client, store) = counting_client();
    let outcome = AgentReconciler::new(client, pulsar_config())
        .reconcile(&ObjectKey::new("default", "non-existent-agent"), None)
        .await
        .unwrap();
    assert_eq!(outcome, ReconcileOutcome::AgentNotFound);
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn deleting_the_agent_removes_its_function() {
    let (client, _) = counting_client();
    let desired = client.create(&agent("default", "short-lived")).await.unwrap();
    AgentReconciler::new(client.clone(), pulsar_config())
        .reconcile(&desired.metadata.key(), None)
        .await
        .unwrap();
    let function: Function = client.get(&desired.metadata.key()).await.unwrap();
    assert_eq!(function.metadata.labels[AGENT_LABEL], "short-lived");

    client.delete::<Agent>(&desired.metadata.key()).await.unwrap();
    assert!(client
        .get::<Function>(&desired.metadata.key())
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn concurrent_invocations_converge() {
    let (client, store) = counting_client();
    seed_tools(&client).await;
    let desired = client.create(&agent_with_tools("assistant")).await.unwrap();
    let key = desired.metadata.key();

    let first = AgentReconciler::new(client.clone(), pulsar_config());
    let second = AgentReconciler::new(client.clone(), pulsar_config());
    let (a, b) = tokio::join!(first.reconcile(&key, None), second.reconcile(&key, None));
    for result in [a, b] {
        if let Err(err) = result {
            assert!(err.is_conflict(), "unexpected error: {err}");
        }
    }

    // Re-delivery after a conflict settles without further changes.
    first.reconcile(&key, None).await.unwrap();
    store.reset();
    first.reconcile(&key, None).await.unwrap();
    assert_eq!(store.writes(), 0);
    assert_eq!(client.list::<Function>(None).await.unwrap().len(), 3);
}
