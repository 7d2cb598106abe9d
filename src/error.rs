//! Error types shared by the index, tree, cleanup and device layers.

use crate::types::DocumentId;
use thiserror::Error;

pub type Result<T, E = SyncError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Two live records share the same (visibleName, parent) key.
    #[error("same file name \"{name}\" under the same parent is not supported, remove either file: {path}")]
    Collision {
        name: String,
        parent: DocumentId,
        path: String,
    },

    /// A parent chain references an id that is not in the index.
    #[error("broken parent chain for {id}: ancestor {missing} not found")]
    OrphanAncestor { id: DocumentId, missing: DocumentId },

    #[error("unknown document id: {0}")]
    UnknownDocument(DocumentId),

    #[error("malformed fingerprint listing line: {0:?}")]
    MalformedFingerprint(String),

    #[error("unreadable lastModified {value:?} on {path} ({id})")]
    InvalidTimestamp {
        id: DocumentId,
        path: String,
        value: String,
    },

    #[error("invalid exclude pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to parse metadata: {0}")]
    MetadataParse(#[from] serde_json::Error),

    #[error("metadata listing mismatch: {paths} paths but {records} records")]
    ListingMismatch { paths: usize, records: usize },

    #[error("`{command}` exited with status {status}: {stderr}")]
    Transport {
        command: String,
        status: i32,
        stderr: String,
    },

    /// The initial connectivity check failed.
    #[error("ssh connection to {host} does not work, verify that you can ssh into the device manually: {message}")]
    Unreachable { host: String, message: String },

    #[error("download of {id} failed: {reason}")]
    Download { id: DocumentId, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("failed to get operator input: {0}")]
    Prompt(String),
}

impl SyncError {
    /// Exit status the binary reports for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            SyncError::Unreachable { .. } => 255,
            _ => 1,
        }
    }
}

impl From<config::ConfigError> for SyncError {
    fn from(err: config::ConfigError) -> Self {
        SyncError::ConfigError(err.to_string())
    }
}
