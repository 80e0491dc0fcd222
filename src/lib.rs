//! Agent Operator: Agent to Function Reconciliation
//!
//! Reconciles user-declared agents into the executable functions that run
//! them. Tool references are resolved against deployed functions and their
//! packages, configuration blobs are composed, and the derived function is
//! written with optimistic concurrency and its status mirrored back.

pub mod api;
pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod manifest;
pub mod reconcile;
pub mod store;
pub mod tooling;
pub mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
