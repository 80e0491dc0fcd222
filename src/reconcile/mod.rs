//! Agent reconciliation
//!
//! Turns an agent into the function that runs it: names are normalized, tool
//! references resolved against deployed functions and their packages, config
//! blobs composed, and the result written with diff-before-write semantics.

pub mod composer;
pub mod normalize;
pub mod reconciler;
pub mod resolver;

pub use composer::{AgentContext, ConfigComposer, ProcessCallback, PulsarRpcConfig};
pub use normalize::normalize_agent_name;
pub use reconciler::{
    build_function, function_drifted, validate_response_source, AgentReconciler, FunctionAction,
    ReconcileOutcome, AGENT_MODULE_NAME, AGENT_PACKAGE_NAME,
};
pub use resolver::{ReferenceResolver, ToolContext};
