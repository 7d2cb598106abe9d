//! Logging System
//!
//! Structured logging through `tracing`. The level, format and destination
//! come from [`LoggingConfig`], with `RESYNC_LOG*` environment variables
//! taking precedence and `-v` flags raising the level on the command line.

use crate::error::SyncError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Resolve the log file path with precedence: CLI, RESYNC_LOG_FILE env, config file, default.
pub fn resolve_log_file_path(
    cli_file: Option<PathBuf>,
    config_file: Option<PathBuf>,
) -> Result<PathBuf, SyncError> {
    if let Some(p) = cli_file {
        if !p.as_os_str().is_empty() {
            return Ok(p);
        }
    }
    if let Ok(env_path) = std::env::var("RESYNC_LOG_FILE") {
        if !env_path.is_empty() {
            return Ok(PathBuf::from(env_path));
        }
    }
    if let Some(p) = config_file {
        if !p.as_os_str().is_empty() {
            return Ok(p);
        }
    }
    default_log_file_path()
}

fn default_log_file_path() -> Result<PathBuf, SyncError> {
    let project_dirs = directories::ProjectDirs::from("", "resync", "resync").ok_or_else(|| {
        SyncError::ConfigError(
            "Could not determine platform state directory for log file".to_string(),
        )
    })?;
    // macOS and Windows have no state dir; fall back to the data dir there.
    let dir = project_dirs
        .state_dir()
        .unwrap_or_else(|| project_dirs.data_local_dir())
        .to_path_buf();
    Ok(dir.join("resync.log"))
}

/// Level selected by repeated `-v` flags; `None` keeps the configured level.
pub fn level_for_verbosity(verbose: u8) -> Option<&'static str> {
    match verbose {
        0 => None,
        1 => Some("info"),
        2 => Some("debug"),
        _ => Some("trace"),
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Whether logging is enabled (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level: trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: json, text (default: text)
    #[serde(default = "default_format")]
    pub format: String,

    /// Output destination: stdout, stderr, file, file+stderr
    #[serde(default = "default_output")]
    pub output: String,

    /// Log file path when output includes file; None means use runtime default
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Enable colored output (text format only, stdout/stderr only)
    #[serde(default = "default_true")]
    pub color: bool,

    /// Module-specific log levels
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_output() -> String {
    "stderr".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            level: default_log_level(),
            format: default_format(),
            output: default_output(),
            file: None,
            color: default_true(),
            modules: HashMap::new(),
        }
    }
}

/// Initialize the logging system
///
/// Priority order (highest to lowest):
/// 1. Environment variables (RESYNC_LOG, RESYNC_LOG_FORMAT, RESYNC_LOG_OUTPUT)
/// 2. The given config, with `-v` already folded into its level
/// 3. Defaults
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), SyncError> {
    let disabled = config.map(|c| !c.enabled).unwrap_or(false);
    if disabled {
        Registry::default()
            .with(EnvFilter::new("off"))
            .with(fmt::layer().with_writer(std::io::sink))
            .try_init()
            .map_err(|e| SyncError::ConfigError(format!("Failed to install logger: {}", e)))?;
        return Ok(());
    }

    let filter = build_env_filter(config)?;
    let format = determine_format(config)?;
    let output = determine_output(config)?;
    let use_color = config.map(|c| c.color).unwrap_or(true);

    let get_file_writer = || -> Result<Mutex<std::fs::File>, SyncError> {
        let log_file = resolve_log_file_path(None, config.and_then(|c| c.file.clone()))?;
        if let Some(parent) = log_file.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SyncError::ConfigError(format!("Failed to create log directory: {}", e))
            })?;
        }
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .map(Mutex::new)
            .map_err(|e| {
                SyncError::ConfigError(format!("Failed to open log file {:?}: {}", log_file, e))
            })
    };

    let base_subscriber = Registry::default().with(filter);
    let installed = match (format.as_str(), output) {
        ("json", Output::FileAndStderr) => {
            let writer = get_file_writer()?.and(std::io::stderr);
            base_subscriber
                .with(json_layer().with_writer(writer))
                .try_init()
        }
        ("json", Output::File) => {
            let writer = get_file_writer()?;
            base_subscriber
                .with(json_layer().with_writer(writer))
                .try_init()
        }
        ("json", Output::Stdout) => base_subscriber
            .with(json_layer().with_writer(std::io::stdout))
            .try_init(),
        ("json", Output::Stderr) => base_subscriber
            .with(json_layer().with_writer(std::io::stderr))
            .try_init(),
        (_, Output::FileAndStderr) => {
            let writer = get_file_writer()?.and(std::io::stderr);
            base_subscriber
                .with(text_layer().with_ansi(false).with_writer(writer))
                .try_init()
        }
        (_, Output::File) => {
            let writer = get_file_writer()?;
            base_subscriber
                .with(text_layer().with_ansi(false).with_writer(writer))
                .try_init()
        }
        (_, Output::Stdout) => base_subscriber
            .with(text_layer().with_ansi(use_color).with_writer(std::io::stdout))
            .try_init(),
        (_, Output::Stderr) => base_subscriber
            .with(text_layer().with_ansi(use_color).with_writer(std::io::stderr))
            .try_init(),
    };
    installed.map_err(|e| SyncError::ConfigError(format!("Failed to install logger: {}", e)))
}

fn json_layer<S>() -> fmt::Layer<
    S,
    fmt::format::JsonFields,
    fmt::format::Format<fmt::format::Json, ChronoUtc>,
> {
    fmt::layer()
        .json()
        .with_target(true)
        .with_timer(ChronoUtc::rfc_3339())
}

fn text_layer<S>(
) -> fmt::Layer<S, fmt::format::DefaultFields, fmt::format::Format<fmt::format::Full, ChronoUtc>> {
    fmt::layer()
        .with_target(true)
        .with_timer(ChronoUtc::rfc_3339())
}

/// Build environment filter from config or environment variables
fn build_env_filter(config: Option<&LoggingConfig>) -> Result<EnvFilter, SyncError> {
    if let Ok(filter) = EnvFilter::try_from_env("RESYNC_LOG") {
        return Ok(filter);
    }

    let level = config.map(|c| c.level.as_str()).unwrap_or("warn");
    if level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let mut filter = EnvFilter::new(level);
    if let Some(config) = config {
        for (module, module_level) in &config.modules {
            let directive = format!("{}={}", module, module_level);
            filter = filter.add_directive(
                directive
                    .parse()
                    .map_err(|e| SyncError::ConfigError(format!("Invalid log directive: {}", e)))?,
            );
        }
    }
    Ok(filter)
}

/// Determine output format from config or environment
fn determine_format(config: Option<&LoggingConfig>) -> Result<String, SyncError> {
    if let Ok(format) = std::env::var("RESYNC_LOG_FORMAT") {
        if format == "json" || format == "text" {
            return Ok(format);
        }
    }

    let format = config.map(|c| c.format.as_str()).unwrap_or("text");
    if format != "json" && format != "text" {
        return Err(SyncError::ConfigError(format!(
            "Invalid log format: {} (must be 'json' or 'text')",
            format
        )));
    }
    Ok(format.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Output {
    Stdout,
    Stderr,
    File,
    FileAndStderr,
}

fn determine_output(config: Option<&LoggingConfig>) -> Result<Output, SyncError> {
    if let Ok(output) = std::env::var("RESYNC_LOG_OUTPUT") {
        return parse_output(&output);
    }
    parse_output(config.map(|c| c.output.as_str()).unwrap_or("stderr"))
}

fn parse_output(output: &str) -> Result<Output, SyncError> {
    match output {
        "stdout" => Ok(Output::Stdout),
        "stderr" => Ok(Output::Stderr),
        "file" => Ok(Output::File),
        "file+stderr" => Ok(Output::FileAndStderr),
        _ => Err(SyncError::ConfigError(format!(
            "Invalid log output: {} (must be 'stdout', 'stderr', 'file' or 'file+stderr')",
            output
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_logging_config() {
        let config = LoggingConfig::default();
        assert!(config.enabled);
        assert_eq!(config.level, "warn");
        assert_eq!(config.format, "text");
        assert_eq!(config.output, "stderr");
        assert_eq!(config.file, None);
    }

    #[test]
    fn test_parse_output() {
        assert_eq!(parse_output("stdout").unwrap(), Output::Stdout);
        assert_eq!(parse_output("file+stderr").unwrap(), Output::FileAndStderr);
        assert!(parse_output("both").is_err());
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(level_for_verbosity(0), None);
        assert_eq!(level_for_verbosity(1), Some("info"));
        assert_eq!(level_for_verbosity(2), Some("debug"));
        assert_eq!(level_for_verbosity(7), Some("trace"));
    }

    #[test]
    fn test_resolve_log_file_path_cli_wins() {
        let cli = Some(PathBuf::from("/tmp/cli.log"));
        let config = Some(PathBuf::from("/tmp/config.log"));
        let path = resolve_log_file_path(cli, config).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/cli.log"));
    }

    #[test]
    fn test_resolve_log_file_path_default_fallback() {
        if std::env::var("RESYNC_LOG_FILE").is_ok() {
            return;
        }
        let path = resolve_log_file_path(None, None).unwrap();
        assert!(path.ends_with("resync.log"));
    }
}
