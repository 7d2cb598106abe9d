//! Configuration
//!
//! [`ResyncConfig`] holds every setting a run needs. Values are layered by
//! [`ConfigLoader`]: built-in defaults, the global config file, an explicit
//! file, then `RESYNC__*` environment variables. Command line flags are
//! applied on top by the CLI.

pub mod facade;
pub mod merge;
pub mod paths;
pub mod sources;

pub use facade::ConfigLoader;

use crate::logging::LoggingConfig;
use crate::policy::{ExistingPolicy, MissingPolicy};
use crate::tree::ExcludePatterns;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// USB network address of the tablet.
pub const DEFAULT_HOST: &str = "10.11.99.1";
pub const DEFAULT_REMOTE_DIR: &str = "~/.local/share/remarkable/xochitl";
pub const DEFAULT_SSH_SOCKET: &str = "/tmp/remarkable-push.socket";
pub const DEFAULT_RESTART_COMMAND: &str = "systemctl restart xochitl";

/// The tablet only offers legacy ssh-rsa host keys.
pub const DEFAULT_SSH_OPTIONS: [&str; 5] = [
    "PubkeyAcceptedKeyTypes=+ssh-rsa",
    "HostKeyAlgorithms=+ssh-rsa",
    "UserKnownHostsFile=/dev/null",
    "StrictHostKeyChecking=no",
    "ConnectTimeout=1",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResyncConfig {
    /// IP address or ssh config alias of the device.
    pub host: String,

    /// Document store directory on the device.
    pub remote_dir: String,

    /// Control-master socket shared by all ssh invocations of a run.
    pub ssh_socket: PathBuf,

    pub ssh_options: Vec<String>,

    pub if_exists: ExistingPolicy,

    pub if_does_not_exist: MissingPolicy,

    /// Regexes matched against the start of tree paths.
    pub exclude: Vec<String>,

    /// Staging directory kept between runs; a temporary one when unset.
    pub transfer_dir: Option<PathBuf>,

    /// Answer yes to every confirmation.
    pub assume_yes: bool,

    pub restart_command: String,

    pub logging: LoggingConfig,
}

impl Default for ResyncConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            remote_dir: DEFAULT_REMOTE_DIR.to_string(),
            ssh_socket: PathBuf::from(DEFAULT_SSH_SOCKET),
            ssh_options: DEFAULT_SSH_OPTIONS.iter().map(|s| s.to_string()).collect(),
            if_exists: ExistingPolicy::default(),
            if_does_not_exist: MissingPolicy::default(),
            exclude: Vec::new(),
            transfer_dir: None,
            assume_yes: false,
            restart_command: DEFAULT_RESTART_COMMAND.to_string(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ResyncConfig {
    /// Check values the type system cannot.
    pub fn validate(&self) -> Result<(), String> {
        if self.host.trim().is_empty() {
            return Err("host must not be empty".to_string());
        }
        if self.remote_dir.trim().is_empty() {
            return Err("remote_dir must not be empty".to_string());
        }
        if self.restart_command.trim().is_empty() {
            return Err("restart_command must not be empty".to_string());
        }
        ExcludePatterns::compile(&self.exclude).map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn excludes(&self) -> crate::error::Result<ExcludePatterns> {
        ExcludePatterns::compile(&self.exclude)
    }
}
