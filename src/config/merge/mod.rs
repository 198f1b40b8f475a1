//! Config composition: merge policy and service.

pub mod service;

use crate::config::SyncspaceConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Builder seeded with the built-in defaults as the lowest-precedence layer.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let defaults = Config::try_from(&SyncspaceConfig::default())?;
    Ok(Config::builder().add_source(defaults))
}
