//! Global config file: $XDG_CONFIG_HOME/agent-operator/config.toml, optional

use crate::config::xdg;
use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File};

pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    match xdg::global_config_path() {
        Ok(path) => Ok(builder.add_source(File::from(path).required(false))),
        // No HOME: there is no global file to read.
        Err(_) => Ok(builder),
    }
}
