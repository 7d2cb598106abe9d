//! Global config file: `$XDG_CONFIG_HOME/resync/config.toml`, optional.

use crate::config::paths::xdg_root;
use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File, FileFormat};

pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let Some(path) = xdg_root::global_config_path() else {
        return Ok(builder);
    };
    let Some(name) = path.to_str() else {
        return Err(ConfigError::Message(format!(
            "config path {} is not valid UTF-8",
            path.display()
        )));
    };
    Ok(builder.add_source(File::new(name, FileFormat::Toml).required(false)))
}
