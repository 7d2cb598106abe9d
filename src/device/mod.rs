//! Device access
//!
//! The [`Device`] trait is everything the sync and cleanup logic needs from
//! the document store: one metadata snapshot, content fingerprints, removal,
//! bulk upload and per-document download.

pub mod local;
pub mod ssh;

pub use local::LocalDevice;
pub use ssh::SshDevice;

use crate::error::{Result, SyncError};
use crate::metadata::MetadataRecord;
use crate::types::DocumentId;
use std::path::Path;

pub trait Device {
    /// All `(id, record)` pairs, read once per run.
    fn fetch_metadata(&mut self) -> Result<Vec<(DocumentId, MetadataRecord)>>;

    /// One `<digest> <path>` line per stored document payload.
    fn fingerprint_listing(&mut self) -> Result<String>;

    /// Stored files whose id has no metadata record.
    fn list_orphans(&mut self) -> Result<Vec<String>>;

    fn remove_orphans(&mut self, files: &[String]) -> Result<()>;

    /// Delete every stored file belonging to `ids`.
    fn remove_ids(&mut self, ids: &[DocumentId]) -> Result<()>;

    /// Copy the contents of a rendered staging directory into the store.
    fn upload(&mut self, staging: &Path) -> Result<()>;

    /// Materialize document `id` as a PDF at `target`.
    fn download_document(&mut self, id: &str, target: &Path) -> Result<()>;

    /// Restart the device's document service so it rereads the store.
    fn restart(&mut self) -> Result<()>;
}

/// Ids are interpolated into shell globs, so only uuid-like ids are accepted.
pub(crate) fn check_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(SyncError::ConfigError(format!(
            "refusing to operate on suspicious id {id:?}"
        )))
    }
}

/// Stem of a stored file name up to its first dot (`<id>.thumbnails` -> `<id>`).
pub(crate) fn id_of_file(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}
