//! Error types for the store, the reconciler and the command-line surface.

use crate::types::{Kind, ObjectKey};
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by every [`ResourceStore`](crate::store::ResourceStore) implementation
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {key} not found")]
    NotFound { kind: Kind, key: ObjectKey },

    #[error("{kind} {key} already exists")]
    AlreadyExists { kind: Kind, key: ObjectKey },

    #[error("conflict on {kind} {key}: expected resource version {expected}, found {actual}")]
    Conflict {
        kind: Kind,
        key: ObjectKey,
        expected: u64,
        actual: u64,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store backend error: {0}")]
    Backend(String),

    #[error("store call exceeded its deadline")]
    Timeout,
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// Version mismatch on update, or a lost race on create
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StoreError::Conflict { .. } | StoreError::AlreadyExists { .. }
        )
    }
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Failure to turn a tool reference into a tool context
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("failed to get function {tool}: {source}")]
    Function {
        tool: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to get package {package}: {source}")]
    Package {
        package: String,
        #[source]
        source: StoreError,
    },

    #[error("module {module} not found in package {package}")]
    ModuleNotFound { module: String, package: String },

    #[error("function {0} does not have a request source")]
    MissingRequestSource(String),
}

/// Errors surfaced by a single reconcile invocation
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("invalid ResponseSource configuration: {0}")]
    Validation(String),

    #[error("failed to build tool context for {tool}: {source}")]
    ToolResolution {
        tool: String,
        #[source]
        source: ResolveError,
    },

    #[error("failed to build {blob} config for agent {agent}: {source}")]
    Compose {
        agent: String,
        blob: &'static str,
        #[source]
        source: Box<ReconcileError>,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("owner reference error: {0}")]
    Ownership(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ReconcileError {
    /// Concurrent modification detected by the store; retried with fresh state
    pub fn is_conflict(&self) -> bool {
        match self {
            ReconcileError::Store(err) => err.is_conflict(),
            _ => false,
        }
    }

    /// Needs a spec correction before it can succeed
    pub fn is_validation(&self) -> bool {
        matches!(self, ReconcileError::Validation(_))
    }

    /// Short machine-readable reason used for recorded events
    pub fn reason(&self) -> &'static str {
        match self {
            ReconcileError::Validation(_) => "InvalidSpec",
            ReconcileError::ToolResolution { .. } => "ToolResolutionFailed",
            ReconcileError::Compose { source, .. } => source.reason(),
            ReconcileError::Serialization(_) => "SerializationFailed",
            ReconcileError::Ownership(_) => "OwnershipConflict",
            ReconcileError::Store(err) if err.is_conflict() => "Conflict",
            ReconcileError::Store(_) => "StoreFailed",
        }
    }
}

/// Errors for configuration, manifests and command execution
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Manifest error in {path}: {message}")]
    Manifest { path: PathBuf, message: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Watch error: {0}")]
    Watch(String),
}
