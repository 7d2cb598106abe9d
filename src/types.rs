//! Core types shared across the document store model.

use serde::{Deserialize, Serialize};

/// Opaque, stable identifier of a stored item (the stem of its `.metadata` file).
pub type DocumentId = String;

/// Parent key used by items that live directly in "My files".
pub const ROOT_PARENT: &str = "";

/// Parent key used by items that were moved to the trash on the device.
pub const TRASH_PARENT: &str = "trash";

/// File extensions the device accepts as documents.
pub const SUPPORTED_EXTENSIONS: [&str; 2] = ["pdf", "epub"];

/// Kind of a stored item, serialized the way the device writes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    #[serde(rename = "CollectionType")]
    Collection,
    #[serde(rename = "DocumentType")]
    Document,
}

impl RecordKind {
    pub fn is_collection(self) -> bool {
        matches!(self, RecordKind::Collection)
    }
}

/// Returns true when `extension` (without the dot, any case) is a document format.
pub fn is_supported_extension(extension: &str) -> bool {
    SUPPORTED_EXTENSIONS
        .iter()
        .any(|ext| ext.eq_ignore_ascii_case(extension))
}
