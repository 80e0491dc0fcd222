//! Reconcile Work Queue
//!
//! Level-triggered, de-duplicating queue of agent keys. A key is held by at
//! most one worker at a time; adding a key that is being processed marks it
//! dirty and it is handed out again once the worker calls [`WorkQueue::done`].
//! Failed keys are re-added after a per-key exponential backoff.

use crate::types::ObjectKey;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::sleep;
use tracing::debug;

/// Queue statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Keys waiting for a worker
    pub pending: usize,
    /// Keys currently held by a worker
    pub processing: usize,
    /// Keys with at least one recorded failure
    pub backing_off: usize,
}

#[derive(Default)]
struct State {
    queue: VecDeque<ObjectKey>,
    /// Keys that must be (re)processed: queued, or added while processing
    dirty: HashSet<ObjectKey>,
    processing: HashSet<ObjectKey>,
    failures: HashMap<ObjectKey, u32>,
}

pub struct WorkQueue {
    state: Mutex<State>,
    notify: Notify,
    shutting_down: AtomicBool,
    base_delay: Duration,
    max_delay: Duration,
}

impl WorkQueue {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State::default()),
            notify: Notify::new(),
            shutting_down: AtomicBool::new(false),
            base_delay,
            max_delay,
        })
    }

    pub fn add(&self, key: ObjectKey) {
        if self.is_shutting_down() {
            return;
        }
        {
            let mut state = self.state.lock();
            if !state.dirty.insert(key.clone()) {
                return;
            }
            if state.processing.contains(&key) {
                // Re-queued by done()
                return;
            }
            state.queue.push_back(key);
        }
        self.notify.notify_one();
    }

    /// Add `key` once `delay` has elapsed
    pub fn add_after(self: &Arc<Self>, key: ObjectKey, delay: Duration) {
        if delay.is_zero() {
            self.add(key);
            return;
        }
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            sleep(delay).await;
            queue.add(key);
        });
    }

    /// Record a failure for `key` and re-add it after its backoff
    pub fn add_rate_limited(self: &Arc<Self>, key: ObjectKey) -> Duration {
        let delay = {
            let mut state = self.state.lock();
            let failures = state.failures.entry(key.clone()).or_insert(0);
            let delay = self.backoff(*failures);
            *failures = failures.saturating_add(1);
            delay
        };
        self.add_after(key, delay);
        delay
    }

    fn backoff(&self, failures: u32) -> Duration {
        let factor = 2u32.checked_pow(failures).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Number of failures recorded for `key` since it last succeeded
    pub fn failures(&self, key: &ObjectKey) -> u32 {
        self.state.lock().failures.get(key).copied().unwrap_or(0)
    }

    /// Clear the backoff history of `key`
    pub fn forget(&self, key: &ObjectKey) {
        self.state.lock().failures.remove(key);
    }

    /// Wait for the next key; `None` once the queue is shut down
    pub async fn get(&self) -> Option<ObjectKey> {
        loop {
            if self.is_shutting_down() {
                return None;
            }

            let next = {
                let mut state = self.state.lock();
                let next = state.queue.pop_front();
                if let Some(key) = &next {
                    state.dirty.remove(key);
                    state.processing.insert(key.clone());
                }
                next
            };
            if next.is_some() {
                return next;
            }

            // Periodic wake-up so shutdown is observed without a notification.
            tokio::select! {
                _ = self.notify.notified() => continue,
                _ = sleep(Duration::from_millis(100)) => continue,
            }
        }
    }

    /// Release `key`; re-queues it when it was added while being processed
    pub fn done(&self, key: &ObjectKey) {
        let requeued = {
            let mut state = self.state.lock();
            state.processing.remove(key);
            if state.dirty.contains(key) {
                state.queue.push_back(key.clone());
                true
            } else {
                false
            }
        };
        if requeued {
            debug!(key = %key, "Re-queued key added during processing");
            self.notify.notify_one();
        }
    }

    pub fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.state.lock();
        QueueStats {
            pending: state.queue.len(),
            processing: state.processing.len(),
            backing_off: state.failures.len(),
        }
    }
}
