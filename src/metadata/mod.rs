//! Metadata records
//!
//! One record per stored item, in the JSON shape the device writes to
//! `<id>.metadata`. Fields this tool does not interpret are carried through
//! untouched so that a load/serialize cycle is lossless.

pub mod index;

pub use index::MetadataIndex;

use crate::error::{Result, SyncError};
use crate::types::{DocumentId, RecordKind, ROOT_PARENT, TRASH_PARENT};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// Metadata record for a single stored item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    #[serde(rename = "visibleName")]
    pub visible_name: String,

    /// Containing collection, empty for root-level items.
    #[serde(default)]
    pub parent: DocumentId,

    #[serde(rename = "type")]
    pub kind: RecordKind,

    /// Milliseconds since the epoch, stored by the device as a decimal string.
    #[serde(
        rename = "lastModified",
        default,
        deserialize_with = "deserialize_timestamp"
    )]
    pub last_modified: String,

    #[serde(default)]
    pub deleted: bool,

    #[serde(default)]
    pub pinned: bool,

    #[serde(rename = "metadatamodified", default)]
    pub metadata_modified: bool,

    #[serde(default)]
    pub modified: bool,

    #[serde(default)]
    pub synced: bool,

    #[serde(default)]
    pub version: u64,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

impl MetadataRecord {
    /// Build a fresh record for an item about to be created on the device.
    pub fn new(kind: RecordKind, name: &str, parent: &str, now_millis: i64) -> Self {
        let last_modified = now_millis.to_string();
        let mut extra = Map::new();
        if kind == RecordKind::Document {
            extra.insert("lastOpened".to_string(), Value::String(last_modified.clone()));
            extra.insert("lastOpenedPage".to_string(), Value::from(0));
        }
        Self {
            visible_name: name.to_string(),
            parent: parent.to_string(),
            kind,
            last_modified,
            deleted: false,
            pinned: false,
            metadata_modified: false,
            modified: false,
            synced: false,
            version: 0,
            extra,
        }
    }

    /// Soft-deleted records never enter the live indices.
    pub fn is_trashed(&self) -> bool {
        self.deleted || self.parent == TRASH_PARENT
    }

    pub fn is_root_level(&self) -> bool {
        self.parent == ROOT_PARENT
    }

    /// Parsed `lastModified`; `None` when the stored value is not an integer.
    pub fn last_modified_millis(&self) -> Option<i64> {
        self.last_modified.trim().parse().ok()
    }
}

/// Pair a `ls -1 *.metadata` listing with the concatenation of the same files.
///
/// The concatenated text is a stream of JSON objects with no separator; each
/// object is matched, in order, with the stem of the corresponding path.
pub fn parse_listing(paths: &str, concatenated: &str) -> Result<Vec<(DocumentId, MetadataRecord)>> {
    let ids: Vec<DocumentId> = paths
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            Path::new(line)
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
        })
        .collect();

    let records = serde_json::Deserializer::from_str(concatenated)
        .into_iter::<MetadataRecord>()
        .collect::<std::result::Result<Vec<_>, _>>()?;

    if ids.len() != records.len() {
        return Err(SyncError::ListingMismatch {
            paths: ids.len(),
            records: records.len(),
        });
    }

    Ok(ids.into_iter().zip(records).collect())
}
