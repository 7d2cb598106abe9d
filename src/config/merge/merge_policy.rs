//! Lowest layer of the merge: the compiled-in defaults.

use crate::config::ResyncConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Start a builder seeded with [`ResyncConfig::default`].
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let defaults = Config::try_from(&ResyncConfig::default())?;
    Ok(Config::builder().add_source(defaults))
}
