//! Controller Runtime
//!
//! Drives the [`AgentReconciler`] from store change notifications. Agent
//! events enqueue their own key; function events enqueue the agent named by
//! their `agent` label. A periodic resync re-enqueues every agent so the
//! reconciler also converges on drift that produced no notification.

pub mod queue;
pub mod recorder;

pub use queue::{QueueStats, WorkQueue};
pub use recorder::{Event, EventRecorder};

use crate::api::{has_agent_label, Agent, AGENT_LABEL};
use crate::error::{ApiError, ReconcileError, StoreError};
use crate::reconcile::{AgentReconciler, PulsarRpcConfig, ReconcileOutcome};
use crate::store::{Client, WatchEvent};
use crate::types::{Kind, ObjectKey};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Controller settings, the `controller` section of the operator config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Concurrent reconcile workers
    pub workers: usize,
    /// First retry delay of a failing key
    pub base_retry_delay_ms: u64,
    /// Upper bound of the retry delay
    pub max_retry_delay_ms: u64,
    /// Deadline of a single reconcile invocation
    pub reconcile_timeout_secs: u64,
    /// Interval between full re-enqueues of every agent
    pub resync_interval_secs: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            base_retry_delay_ms: 5,
            max_retry_delay_ms: 300_000,
            reconcile_timeout_secs: 30,
            resync_interval_secs: 300,
        }
    }
}

impl ControllerConfig {
    pub fn base_retry_delay(&self) -> Duration {
        Duration::from_millis(self.base_retry_delay_ms)
    }

    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_millis(self.max_retry_delay_ms)
    }

    pub fn reconcile_timeout(&self) -> Duration {
        Duration::from_secs(self.reconcile_timeout_secs)
    }

    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs)
    }
}

/// The agent key a change notification should trigger, if any
pub fn keys_for_event(event: &WatchEvent) -> Option<ObjectKey> {
    let metadata = &event.object.metadata;
    match event.kind {
        Kind::Agent => Some(metadata.key()),
        Kind::Function if has_agent_label(metadata) => metadata
            .labels
            .get(AGENT_LABEL)
            .map(|agent| ObjectKey::new(metadata.namespace.clone(), agent.clone())),
        Kind::Function | Kind::Package => None,
    }
}

pub struct Controller {
    reconciler: AgentReconciler,
    queue: Arc<WorkQueue>,
    recorder: Arc<EventRecorder>,
    config: ControllerConfig,
}

impl Controller {
    pub fn new(client: Client, pulsar: PulsarRpcConfig, config: ControllerConfig) -> Self {
        Self {
            reconciler: AgentReconciler::new(client, pulsar),
            queue: WorkQueue::new(config.base_retry_delay(), config.max_retry_delay()),
            recorder: Arc::new(EventRecorder::default()),
            config,
        }
    }

    pub fn queue(&self) -> &Arc<WorkQueue> {
        &self.queue
    }

    pub fn recorder(&self) -> &Arc<EventRecorder> {
        &self.recorder
    }

    pub fn client(&self) -> &Client {
        self.reconciler.client()
    }

    /// Enqueue every stored agent
    pub async fn enqueue_all(&self) -> Result<usize, StoreError> {
        let agents: Vec<Agent> = self.client().list(None).await?;
        let count = agents.len();
        for agent in agents {
            self.queue.add(agent.metadata.key());
        }
        Ok(count)
    }

    /// Run until `shutdown` completes; in-flight invocations finish first
    pub async fn run<F>(&self, shutdown: F) -> Result<(), ApiError>
    where
        F: Future<Output = ()>,
    {
        // Subscribe before listing so no write between the two is missed.
        let events = self.client().watch();
        let queued = self.enqueue_all().await?;
        info!(
            agents = queued,
            workers = self.config.workers,
            "Controller started"
        );

        let workers = join_all((0..self.config.workers).map(|id| self.worker(id)));
        let control = async {
            tokio::select! {
                _ = shutdown => info!("Shutdown requested"),
                _ = self.dispatch(events) => warn!("Watch channel closed"),
            }
            self.queue.shutdown();
        };
        futures::join!(workers, control);

        info!("Controller stopped");
        Ok(())
    }

    async fn dispatch(&self, mut events: broadcast::Receiver<WatchEvent>) {
        let mut resync = tokio::time::interval(self.config.resync_interval());
        // The first tick is immediate and the initial list already ran.
        resync.tick().await;

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => {
                        if let Some(key) = keys_for_event(&event) {
                            debug!(kind = %event.kind, key = %key, "Change notification");
                            self.queue.add(key);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Watch lagged behind, resyncing");
                        self.resync().await;
                    }
                    Err(RecvError::Closed) => return,
                },
                _ = resync.tick() => self.resync().await,
            }
        }
    }

    async fn resync(&self) {
        match self.enqueue_all().await {
            Ok(count) => debug!(agents = count, "Resync"),
            Err(e) => warn!(error = %e, "Resync failed"),
        }
    }

    async fn worker(&self, worker_id: usize) {
        debug!(worker_id, "Worker started");
        while let Some(key) = self.queue.get().await {
            self.process(worker_id, &key).await;
            self.queue.done(&key);
        }
        debug!(worker_id, "Worker stopped");
    }

    /// One bounded invocation for `key`, classified and requeued on failure
    async fn process(&self, worker_id: usize, key: &ObjectKey) {
        let deadline = Instant::now() + self.config.reconcile_timeout();
        match self.reconciler.reconcile(key, Some(deadline)).await {
            Ok(outcome) => {
                self.queue.forget(key);
                self.recorder.clear(key);
                if let ReconcileOutcome::Synced { .. } = outcome {
                    debug!(worker_id, agent = %key, writes = outcome.writes(), "Reconciled");
                }
            }
            Err(err) if err.is_conflict() => {
                let delay = self.queue.add_rate_limited(key.clone());
                debug!(
                    worker_id,
                    agent = %key,
                    error = %err,
                    retry_in_ms = delay.as_millis() as u64,
                    "Conflict during reconcile, retrying"
                );
            }
            Err(err) => {
                let attempt = self.queue.failures(key) + 1;
                let delay = self.queue.add_rate_limited(key.clone());
                self.recorder.warn(key, err.reason(), err.to_string());
                error!(
                    worker_id,
                    agent = %key,
                    attempt,
                    reason = err.reason(),
                    error = %err,
                    retry_in_ms = delay.as_millis() as u64,
                    "Reconcile failed"
                );
            }
        }
    }

    /// Reconcile every stored agent once, in key order, without retries
    pub async fn reconcile_all(
        &self,
    ) -> Result<Vec<(ObjectKey, Result<ReconcileOutcome, ReconcileError>)>, StoreError> {
        let agents: Vec<Agent> = self.client().list(None).await?;
        let mut results = Vec::with_capacity(agents.len());
        for agent in agents {
            let key = agent.metadata.key();
            let deadline = Instant::now() + self.config.reconcile_timeout();
            let result = self.reconciler.reconcile(&key, Some(deadline)).await;
            match &result {
                Ok(_) => self.recorder.clear(&key),
                Err(err) => self.recorder.warn(&key, err.reason(), err.to_string()),
            }
            results.push((key, result));
        }
        Ok(results)
    }
}
