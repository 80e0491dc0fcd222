//! Source composition for the operator configuration.

pub mod merge_policy;
pub mod service;
