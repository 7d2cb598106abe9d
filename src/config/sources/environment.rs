//! Environment variable source: RESYNC__ prefix with __ separator

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;

/// Add environment variable overlay to builder.
/// `RESYNC__HOST`, `RESYNC__LOGGING__LEVEL`, ...
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let builder = builder.add_source(
        Environment::with_prefix("RESYNC")
            .separator("__")
            .try_parsing(true),
    );
    Ok(builder)
}
