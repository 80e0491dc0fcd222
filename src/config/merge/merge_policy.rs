//! Merge policy: built-in defaults form the lowest layer.

use crate::config::OperatorConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Builder seeded with `OperatorConfig::default()` so every later source
/// only needs to name the keys it overrides.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let defaults = Config::try_from(&OperatorConfig::default())?;
    Ok(Config::builder().add_source(defaults))
}
