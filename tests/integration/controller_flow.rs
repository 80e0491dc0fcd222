use std::time::Duration;

use agent_operator::api::{Agent, Function, FunctionStatus};
use agent_operator::controller::{Controller, ControllerConfig};
use agent_operator::store::Client;
use agent_operator::test_support::{agent, memory_client, pulsar_config};
use agent_operator::types::ObjectKey;
use tokio::sync::oneshot;
use tokio::time::{sleep, timeout};

fn config() -> ControllerConfig {
    ControllerConfig {
        workers: 2,
        base_retry_delay_ms: 1,
        max_retry_delay_ms: 50,
        reconcile_timeout_secs: 5,
        resync_interval_secs: 60,
    }
}

async fn wait_for<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    while !check().await {
        sleep(Duration::from_millis(5)).await;
    }
}

async fn replicas(client: &Client, key: &ObjectKey) -> i32 {
    match client.get::<Agent>(key).await {
        Ok(agent) => agent.status.function_status.ready_replicas,
        Err(_) => -1,
    }
}

#[tokio::test]
async fn function_status_is_mirrored_while_running() {
    let client = memory_client();
    let created = client.create(&agent("default", "mirrored")).await.unwrap();
    let key = created.metadata.key();
    let controller = Controller::new(client.clone(), pulsar_config(), config());
    let (stop, stopped) = oneshot::channel::<()>();

    let driver = async {
        let (client, key) = (&client, &key);
        wait_for(|| async move { client.get::<Function>(key).await.is_ok() }).await;

        let mut function: Function = client.get(key).await.unwrap();
        function.status = FunctionStatus {
            replicas: 1,
            ready_replicas: 1,
            available_replicas: 1,
            updated_replicas: 1,
            observed_generation: function.metadata.generation as i64,
        };
        client.update_status(&function).await.unwrap();

        wait_for(|| async move { replicas(client, key).await == 1 }).await;
        let _ = stop.send(());
    };

    let (result, _) = timeout(Duration::from_secs(5), async {
        tokio::join!(controller.run(async { stopped.await.ok(); }), driver)
    })
    .await
    .unwrap();
    result.unwrap();
}

#[tokio::test]
async fn agent_edits_are_propagated_and_drift_repaired() {
    let client = memory_client();
    let created = client.create(&agent("default", "edited")).await.unwrap();
    let key = created.metadata.key();
    let controller = Controller::new(client.clone(), pulsar_config(), config());
    let (stop, stopped) = oneshot::channel::<()>();

    let instruction = |function: &Function| {
        function.spec.config["agent"]["instruction"]
            .as_str()
            .unwrap_or_default()
            .to_string()
    };

    let driver = async {
        let (client, key) = (&client, &key);
        wait_for(|| async move { client.get::<Function>(key).await.is_ok() }).await;

        let mut edited: Agent = client.get(key).await.unwrap();
        edited.spec.instruction = "Answer in French".to_string();
        client.update(&edited).await.unwrap();
        wait_for(|| async move {
            match client.get::<Function>(key).await {
                Ok(f) => instruction(&f) == "Answer in French",
                Err(_) => false,
            }
        })
        .await;

        // Hand-edit the derived function; the controller restores it.
        let mut function: Function = client.get(key).await.unwrap();
        function.spec.config.remove("agent");
        client.update(&function).await.unwrap();
        wait_for(|| async move {
            match client.get::<Function>(key).await {
                Ok(f) => f.spec.config.contains_key("agent"),
                Err(_) => false,
            }
        })
        .await;

        let _ = stop.send(());
    };

    let (result, _) = timeout(Duration::from_secs(5), async {
        tokio::join!(controller.run(async { stopped.await.ok(); }), driver)
    })
    .await
    .unwrap();
    result.unwrap();
}
