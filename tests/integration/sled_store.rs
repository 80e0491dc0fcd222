use std::sync::Arc;

use agent_operator::api::{Function, Module, ToolReference};
use agent_operator::reconcile::{AgentReconciler, FunctionAction, ReconcileOutcome};
use agent_operator::store::{Client, SledStore};
use agent_operator::test_support::{agent, package, pulsar_config, tool_function, CountingStore};
use agent_operator::types::ObjectKey;
use tempfile::TempDir;

fn open(temp: &TempDir) -> (Client, Arc<CountingStore>) {
    let sled = SledStore::open(&temp.path().join("store")).unwrap();
    let store = Arc::new(CountingStore::new(Arc::new(sled)));
    (Client::new(store.clone()), store)
}

#[tokio::test]
async fn reconciled_state_survives_reopen() {
    let temp = TempDir::new().unwrap();
    let key = {
        let (client, _) = open(&temp);
        client
            .create(&package("default", "toolbox", &[("lookup", Module::default())]))
            .await
            .unwrap();
        client
            .create(&tool_function("default", "lookup", "toolbox", "lookup", Some("lookups")))
            .await
            .unwrap();
        let mut desired = agent("default", "librarian");
        desired.spec.tools = vec![ToolReference::new("lookup")];
        let created = client.create(&desired).await.unwrap();

        let outcome = AgentReconciler::new(client.clone(), pulsar_config())
            .reconcile(&created.metadata.key(), None)
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            ReconcileOutcome::Synced {
                function: FunctionAction::Created,
                ..
            }
        ));
        created.metadata.key()
    };

    let (client, store) = open(&temp);
    let function: Function = client.get(&key).await.unwrap();
    assert_eq!(
        function.spec.config["agent"]["tools"]["lookup"]["requestSource"],
        "lookups"
    );

    let outcome = AgentReconciler::new(client, pulsar_config())
        .reconcile(&key, None)
        .await
        .unwrap();
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
async fn slashes_in_keys_do_not_alias_records() {
    let temp = TempDir::new().unwrap();
    let (client, _) = open(&temp);

    client
        .create(&tool_function("a", "b/c", "toolbox", "m", None))
        .await
        .unwrap();
    client
        .create(&tool_function("a/b", "c", "toolbox", "m", None))
        .await
        .unwrap();

    let nested: Function = client.get(&ObjectKey::new("a/b", "c")).await.unwrap();
    assert_eq!(nested.metadata.key(), ObjectKey::new("a/b", "c"));
    let flat: Function = client.get(&ObjectKey::new("a", "b/c")).await.unwrap();
    assert_eq!(flat.metadata.key(), ObjectKey::new("a", "b/c"));

    let in_a: Vec<Function> = client.list(Some("a")).await.unwrap();
    assert_eq!(in_a.len(), 1);
    assert_eq!(in_a[0].metadata.name, "b/c");

    let all: Vec<ObjectKey> = client
        .list::<Function>(None)
        .await
        .unwrap()
        .iter()
        .map(|f| f.metadata.key())
        .collect();
    assert_eq!(all, vec![ObjectKey::new("a", "b/c"), ObjectKey::new("a/b", "c")]);
}
