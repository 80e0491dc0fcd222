//! Operator configuration
//!
//! Layered with the `config` crate: built-in defaults, then the global file
//! `$XDG_CONFIG_HOME/agent-operator/config.toml`, then an explicit `--config`
//! file, then `AGENT_OPERATOR__*` environment variables.

pub mod facade;
pub mod merge;
pub mod paths;
pub mod sources;

pub use facade::ConfigLoader;
pub use paths::xdg_root as xdg;

use crate::controller::ControllerConfig;
use crate::error::{ApiError, StoreError};
use crate::logging::{parse_output_destinations, validate_format, LoggingConfig};
use crate::reconcile::PulsarRpcConfig;
use crate::store::{MemoryStore, ResourceStore, SledStore};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Sled,
}

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// sled database directory; defaults to `$XDG_DATA_HOME/agent-operator/store`
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    pub fn resolve_path(&self) -> Result<PathBuf, ApiError> {
        match &self.path {
            Some(path) if !path.as_os_str().is_empty() => Ok(path.clone()),
            _ => xdg::default_store_path(),
        }
    }

    /// Open the configured backend
    pub fn open(&self) -> Result<Arc<dyn ResourceStore>, ApiError> {
        match self.backend {
            StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
            StoreBackend::Sled => {
                let path = self.resolve_path()?;
                let store = SledStore::open(&path).map_err(|e| match e {
                    StoreError::Backend(message) => ApiError::ConfigError(format!(
                        "Failed to open store at {}: {}",
                        path.display(),
                        message
                    )),
                    other => ApiError::Store(other),
                })?;
                Ok(Arc::new(store))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OperatorConfig {
    /// Transport settings injected into every `pulsarRpc` blob
    #[serde(default)]
    pub pulsar: PulsarRpcConfig,

    #[serde(default)]
    pub controller: ControllerConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl OperatorConfig {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = Vec::new();

        if self.pulsar.service_url.trim().is_empty() {
            errors.push("pulsar.service_url must not be empty".to_string());
        }
        if self.controller.workers == 0 {
            errors.push("controller.workers must be at least 1".to_string());
        }
        if self.controller.reconcile_timeout_secs == 0 {
            errors.push("controller.reconcile_timeout_secs must be positive".to_string());
        }
        if self.controller.resync_interval_secs == 0 {
            errors.push("controller.resync_interval_secs must be positive".to_string());
        }
        if self.controller.base_retry_delay_ms > self.controller.max_retry_delay_ms {
            errors.push(format!(
                "controller.base_retry_delay_ms ({}) exceeds max_retry_delay_ms ({})",
                self.controller.base_retry_delay_ms, self.controller.max_retry_delay_ms
            ));
        }
        if let Err(e) = validate_format(&self.logging.format) {
            errors.push(e.to_string());
        }
        if let Err(e) = parse_output_destinations(&self.logging.output) {
            errors.push(e.to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::ConfigError(errors.join("; ")))
        }
    }
}
