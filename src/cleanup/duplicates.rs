//! Duplicate detection and survivor selection.
//!
//! Everything here is pure: the cleanup engine feeds in the fingerprint
//! listing and the operator's answer, and gets back which ids to remove.

use crate::error::{Result, SyncError};
use crate::metadata::MetadataRecord;
use crate::types::DocumentId;
use std::collections::BTreeMap;
use std::path::Path;

/// Group ids by content digest from `<digest> <path>` lines.
///
/// Any line that does not split into exactly two fields makes the whole
/// listing untrustworthy.
pub fn parse_fingerprints(listing: &str) -> Result<BTreeMap<String, Vec<DocumentId>>> {
    let mut groups: BTreeMap<String, Vec<DocumentId>> = BTreeMap::new();
    for line in listing.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        let [digest, path] = fields.as_slice() else {
            return Err(SyncError::MalformedFingerprint(line.to_string()));
        };
        let id = Path::new(path)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| SyncError::MalformedFingerprint(line.to_string()))?;
        groups.entry(digest.to_string()).or_default().push(id);
    }
    Ok(groups)
}

/// Digests shared by at least two stored payloads.
pub fn duplicate_groups(
    groups: BTreeMap<String, Vec<DocumentId>>,
) -> Vec<(String, Vec<DocumentId>)> {
    groups
        .into_iter()
        .filter(|(_, ids)| ids.len() >= 2)
        .collect()
}

/// One member of a duplicate group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: DocumentId,
    pub path: String,
    pub last_modified: i64,
}

impl Candidate {
    /// Fails when `lastModified` is not an integer; the timestamp is never guessed.
    pub fn from_record(id: &str, record: &MetadataRecord, path: String) -> Result<Self> {
        let last_modified =
            record
                .last_modified_millis()
                .ok_or_else(|| SyncError::InvalidTimestamp {
                    id: id.to_string(),
                    path: path.clone(),
                    value: record.last_modified.clone(),
                })?;
        Ok(Self {
            id: id.to_string(),
            path,
            last_modified,
        })
    }

    pub fn modified_at(&self) -> String {
        chrono::DateTime::from_timestamp_millis(self.last_modified)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| self.last_modified.to_string())
    }
}

/// Candidates of one group, newest first, waiting for the operator's choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionRequest {
    pub fingerprint: String,
    pub candidates: Vec<Candidate>,
}

impl SelectionRequest {
    /// Index kept when the operator accepts the default.
    pub const DEFAULT: usize = 0;

    pub fn needs_operator(&self) -> bool {
        self.candidates.len() > 1
    }

    pub fn accepts(&self, selection: Selection) -> bool {
        match selection {
            Selection::Keep(i) => i < self.candidates.len(),
            _ => true,
        }
    }
}

/// Sort a group newest first; equal timestamps keep their listing order.
pub fn choose_survivor(fingerprint: &str, mut candidates: Vec<Candidate>) -> SelectionRequest {
    candidates.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
    SelectionRequest {
        fingerprint: fingerprint.to_string(),
        candidates,
    }
}

/// The operator's answer for one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Keep the newest candidate.
    Default,
    Keep(usize),
    SkipGroup,
    StopAll,
}

impl Selection {
    /// Parse a typed answer: empty, an index, `n` (skip group) or `N` (stop).
    pub fn parse(input: &str, candidates: usize) -> std::result::Result<Self, String> {
        match input.trim() {
            "" => Ok(Selection::Default),
            "n" => Ok(Selection::SkipGroup),
            "N" => Ok(Selection::StopAll),
            other => {
                let index: usize = other
                    .parse()
                    .map_err(|_| format!("input parsing error ('{other}'), try again"))?;
                if index < candidates {
                    Ok(Selection::Keep(index))
                } else {
                    Err(format!(
                        "enter a number from 0 to {}",
                        candidates.saturating_sub(1)
                    ))
                }
            }
        }
    }
}

/// What to do with a group once the operator has answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupDecision {
    Resolve {
        keep: DocumentId,
        remove: Vec<DocumentId>,
    },
    Skip,
    Stop,
}

pub fn decide(request: &SelectionRequest, selection: Selection) -> GroupDecision {
    let keep_index = match selection {
        Selection::Default => SelectionRequest::DEFAULT,
        Selection::Keep(i) => i,
        Selection::SkipGroup => return GroupDecision::Skip,
        Selection::StopAll => return GroupDecision::Stop,
    };
    let Some(kept) = request.candidates.get(keep_index) else {
        return GroupDecision::Skip;
    };
    GroupDecision::Resolve {
        keep: kept.id.clone(),
        remove: request
            .candidates
            .iter()
            .filter(|c| c.id != kept.id)
            .map(|c| c.id.clone())
            .collect(),
    }
}
