//! Metadata index
//!
//! Four lookup structures derived from a one-time snapshot of the device's
//! metadata records. The index is owned by a single run and passed by
//! reference to the tree builders and cleanup passes.

use super::MetadataRecord;
use crate::error::{Result, SyncError};
use crate::types::{DocumentId, ROOT_PARENT};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataIndex {
    by_id: BTreeMap<DocumentId, MetadataRecord>,
    by_name: BTreeMap<String, BTreeSet<DocumentId>>,
    /// Absence of a key means the parent has no children.
    by_parent: BTreeMap<DocumentId, BTreeSet<DocumentId>>,
    by_name_and_parent: BTreeMap<(String, DocumentId), DocumentId>,
    /// Soft-deleted records, kept apart so that only the trash purge sees them.
    trash: BTreeMap<DocumentId, MetadataRecord>,
}

impl MetadataIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the index from `(id, record)` pairs.
    ///
    /// Fails on the first live record whose (visibleName, parent) key is
    /// already taken.
    pub fn load<I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = (DocumentId, MetadataRecord)>,
    {
        let mut index = Self::new();
        for (id, record) in records {
            index.insert(id, record)?;
        }
        debug!(
            live = index.by_id.len(),
            trashed = index.trash.len(),
            "metadata index loaded"
        );
        Ok(index)
    }

    fn insert(&mut self, id: DocumentId, record: MetadataRecord) -> Result<()> {
        if record.is_trashed() {
            self.trash.insert(id, record);
            return Ok(());
        }

        let key = (record.visible_name.clone(), record.parent.clone());
        if self.by_name_and_parent.contains_key(&key) {
            let path = self
                .resolve_record_path(&id, &record)
                .unwrap_or_else(|_| format!("{}/{}", record.parent, record.visible_name));
            return Err(SyncError::Collision {
                name: record.visible_name,
                parent: record.parent,
                path,
            });
        }

        self.by_name_and_parent.insert(key, id.clone());
        self.by_name
            .entry(record.visible_name.clone())
            .or_default()
            .insert(id.clone());
        self.by_parent
            .entry(record.parent.clone())
            .or_default()
            .insert(id.clone());
        self.by_id.insert(id, record);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&MetadataRecord> {
        self.by_id.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// All live records in id order.
    pub fn records(&self) -> impl Iterator<Item = (&DocumentId, &MetadataRecord)> {
        self.by_id.iter()
    }

    /// Soft-deleted records (deleted flag or parent `trash`).
    pub fn trashed(&self) -> impl Iterator<Item = (&DocumentId, &MetadataRecord)> {
        self.trash.iter()
    }

    /// Every live record carrying `name`, across all parents.
    pub fn find_by_name(&self, name: &str) -> Vec<(&DocumentId, &MetadataRecord)> {
        self.by_name
            .get(name)
            .into_iter()
            .flatten()
            .filter_map(|id| self.by_id.get_key_value(id))
            .collect()
    }

    /// The single live record named `name` directly under `parent`.
    pub fn lookup(&self, name: &str, parent: &str) -> Option<(&DocumentId, &MetadataRecord)> {
        self.by_name_and_parent
            .get(&(name.to_string(), parent.to_string()))
            .and_then(|id| self.by_id.get_key_value(id))
    }

    /// Children of `parent`, empty when it has none.
    pub fn children_of(&self, parent: &str) -> Vec<(&DocumentId, &MetadataRecord)> {
        self.by_parent
            .get(parent)
            .into_iter()
            .flatten()
            .filter_map(|id| self.by_id.get_key_value(id))
            .collect()
    }

    pub fn has_children(&self, parent: &str) -> bool {
        self.by_parent.contains_key(parent)
    }

    /// `/`-joined visible names from the root down to `id`.
    pub fn resolve_full_path(&self, id: &str) -> Result<String> {
        let record = self
            .by_id
            .get(id)
            .ok_or_else(|| SyncError::UnknownDocument(id.to_string()))?;
        self.resolve_record_path(id, record)
    }

    /// Path of a record that need not be in the live index itself (e.g. trash).
    pub fn resolve_record_path(&self, id: &str, record: &MetadataRecord) -> Result<String> {
        let mut names = vec![record.visible_name.as_str()];
        let mut child = record;
        let mut child_id = id;
        // A chain longer than the index can only be a cycle.
        for _ in 0..=self.by_id.len() {
            if child.parent == ROOT_PARENT {
                names.reverse();
                return Ok(format!("/{}", names.join("/")));
            }
            let parent_id = child.parent.as_str();
            let parent = self.by_id.get(parent_id).ok_or_else(|| SyncError::OrphanAncestor {
                id: child_id.to_string(),
                missing: parent_id.to_string(),
            })?;
            names.push(parent.visible_name.as_str());
            child_id = parent_id;
            child = parent;
        }
        Err(SyncError::OrphanAncestor {
            id: child_id.to_string(),
            missing: child.parent.clone(),
        })
    }

    /// Drop `id` from every index, or from the trash if it was soft-deleted.
    ///
    /// Removes the parent's by-parent entry once its last child is gone, so a
    /// collection emptied here is seen as childless by later scans.
    pub fn remove(&mut self, id: &str) -> Option<MetadataRecord> {
        let Some(record) = self.by_id.remove(id) else {
            return self.trash.remove(id);
        };

        if let Some(siblings) = self.by_parent.get_mut(&record.parent) {
            siblings.remove(id);
            if siblings.is_empty() {
                self.by_parent.remove(&record.parent);
            }
        }
        if let Some(named) = self.by_name.get_mut(&record.visible_name) {
            named.remove(id);
            if named.is_empty() {
                self.by_name.remove(&record.visible_name);
            }
        }
        let key = (record.visible_name.clone(), record.parent.clone());
        if self.by_name_and_parent.get(&key).map(String::as_str) == Some(id) {
            self.by_name_and_parent.remove(&key);
        }

        Some(record)
    }
}
