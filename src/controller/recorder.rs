//! Warning events recorded against agents whose reconciliation failed.

use crate::types::ObjectKey;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};

/// Events kept per key before the oldest is dropped
pub const DEFAULT_EVENTS_PER_KEY: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub reason: String,
    pub message: String,
    pub count: u32,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

pub struct EventRecorder {
    events: RwLock<HashMap<ObjectKey, VecDeque<Event>>>,
    capacity: usize,
}

impl EventRecorder {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Record a warning; a repeat of the latest event only bumps its count
    pub fn warn(&self, key: &ObjectKey, reason: &str, message: impl Into<String>) {
        let message = message.into();
        let now = Utc::now();
        let mut events = self.events.write();
        let log = events.entry(key.clone()).or_default();

        if let Some(last) = log.back_mut() {
            if last.reason == reason && last.message == message {
                last.count += 1;
                last.last_seen = now;
                return;
            }
        }

        if log.len() == self.capacity {
            log.pop_front();
        }
        log.push_back(Event {
            reason: reason.to_string(),
            message,
            count: 1,
            first_seen: now,
            last_seen: now,
        });
    }

    /// Events for `key`, oldest first
    pub fn events(&self, key: &ObjectKey) -> Vec<Event> {
        self.events
            .read()
            .get(key)
            .map(|log| log.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn latest(&self, key: &ObjectKey) -> Option<Event> {
        self.events.read().get(key).and_then(|log| log.back().cloned())
    }

    /// Most recent event of every key that still has unresolved warnings, in key order
    pub fn outstanding(&self) -> Vec<(ObjectKey, Event)> {
        let mut latest: Vec<(ObjectKey, Event)> = self
            .events
            .read()
            .iter()
            .filter_map(|(key, log)| log.back().map(|event| (key.clone(), event.clone())))
            .collect();
        latest.sort_by(|a, b| a.0.cmp(&b.0));
        latest
    }

    /// Drop the history of `key` once it reconciles cleanly
    pub fn clear(&self, key: &ObjectKey) {
        self.events.write().remove(key);
    }
}

impl Default for EventRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_EVENTS_PER_KEY)
    }
}
