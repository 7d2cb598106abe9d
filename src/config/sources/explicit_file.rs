//! File named on the command line; it must exist.

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File, FileFormat};
use std::path::Path;

pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    path: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let name = path.to_str().ok_or_else(|| {
        ConfigError::Message(format!("config path {} is not valid UTF-8", path.display()))
    })?;
    Ok(builder.add_source(File::new(name, FileFormat::Toml).required(true)))
}
