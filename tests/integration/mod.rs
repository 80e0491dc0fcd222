//! Integration tests for the agent operator

mod cli_contracts;
mod controller_flow;
mod reconcile_flow;
mod sled_store;
