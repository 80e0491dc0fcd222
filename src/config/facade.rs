//! ConfigLoader facade delegating to merge service.

use super::merge::service::MergeService;
use super::OperatorConfig;
use crate::error::ApiError;
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from the global file, an optional explicit file and
    /// the environment, then validate it.
    pub fn load(explicit: Option<&Path>) -> Result<OperatorConfig, ApiError> {
        let config = MergeService::load(explicit)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file, ignoring the global file.
    pub fn load_from_file(path: &Path) -> Result<OperatorConfig, ApiError> {
        let config = MergeService::load_from_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Create default configuration.
    pub fn default() -> OperatorConfig {
        OperatorConfig::default()
    }
}
