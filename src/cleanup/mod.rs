//! Store cleanup
//!
//! Four independent passes over the metadata index: trash purge, orphan
//! purge, duplicate resolution and the empty-collection fixpoint. Each pass
//! reports whether it removed anything so the caller knows whether the
//! device service has to be restarted.

pub mod duplicates;

pub use duplicates::{
    choose_survivor, decide, parse_fingerprints, Candidate, GroupDecision, Selection,
    SelectionRequest,
};

use crate::device::Device;
use crate::error::Result;
use crate::metadata::MetadataIndex;
use crate::types::{DocumentId, RecordKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{info, warn};

/// The cleanup passes, in the order they run by default.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum CleanupPass {
    Trash,
    Orphans,
    Duplicates,
    EmptyCollections,
}

impl CleanupPass {
    pub const ALL: [CleanupPass; 4] = [
        CleanupPass::Trash,
        CleanupPass::Orphans,
        CleanupPass::Duplicates,
        CleanupPass::EmptyCollections,
    ];
}

impl fmt::Display for CleanupPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CleanupPass::Trash => "trash",
            CleanupPass::Orphans => "orphans",
            CleanupPass::Duplicates => "duplicates",
            CleanupPass::EmptyCollections => "empty-collections",
        };
        f.write_str(name)
    }
}

/// Confirmation and selection answers from whoever drives the cleanup.
pub trait Operator {
    fn confirm(&mut self, prompt: &str) -> Result<bool>;

    /// Choose the survivor of a duplicate group. Out-of-range answers are
    /// asked again.
    fn select(&mut self, request: &SelectionRequest, position: usize, total: usize)
        -> Result<Selection>;
}

/// Result of one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassOutcome {
    pub pass: CleanupPass,
    /// Items found eligible for removal.
    pub found: usize,
    /// Ids (or file names, for orphans) actually removed.
    pub removed: Vec<String>,
    /// Entries skipped because of broken metadata.
    pub skipped: usize,
    /// Fixpoint scans that found something (empty-collection pass only).
    pub iterations: usize,
}

impl PassOutcome {
    fn new(pass: CleanupPass) -> Self {
        Self {
            pass,
            found: 0,
            removed: Vec::new(),
            skipped: 0,
            iterations: 0,
        }
    }

    pub fn changed(&self) -> bool {
        !self.removed.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub outcomes: Vec<PassOutcome>,
}

impl CleanupReport {
    /// True when any pass removed something from the store.
    pub fn state_changed(&self) -> bool {
        self.outcomes.iter().any(PassOutcome::changed)
    }
}

pub struct CleanupEngine<'a, D: Device + ?Sized, O: Operator + ?Sized> {
    index: &'a mut MetadataIndex,
    device: &'a mut D,
    operator: &'a mut O,
    assume_yes: bool,
}

impl<'a, D: Device + ?Sized, O: Operator + ?Sized> CleanupEngine<'a, D, O> {
    pub fn new(index: &'a mut MetadataIndex, device: &'a mut D, operator: &'a mut O) -> Self {
        Self {
            index,
            device,
            operator,
            assume_yes: false,
        }
    }

    /// Skip confirmation prompts. Duplicate selection is still asked.
    pub fn assume_yes(mut self, yes: bool) -> Self {
        self.assume_yes = yes;
        self
    }

    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        if self.assume_yes {
            return Ok(true);
        }
        self.operator.confirm(prompt)
    }

    pub fn run(&mut self, passes: &[CleanupPass]) -> Result<CleanupReport> {
        let mut report = CleanupReport::default();
        for pass in passes {
            let outcome = match pass {
                CleanupPass::Trash => self.purge_trash()?,
                CleanupPass::Orphans => self.purge_orphans()?,
                CleanupPass::Duplicates => self.resolve_duplicates()?,
                CleanupPass::EmptyCollections => self.purge_empty_collections()?,
            };
            report.outcomes.push(outcome);
        }
        Ok(report)
    }

    /// Remove every record flagged `deleted` in one batch.
    pub fn purge_trash(&mut self) -> Result<PassOutcome> {
        info!("removing trash files");
        let mut outcome = PassOutcome::new(CleanupPass::Trash);
        let deleted: Vec<DocumentId> = self
            .index
            .trashed()
            .filter(|(_, record)| record.deleted)
            .map(|(id, _)| id.clone())
            .collect();
        outcome.found = deleted.len();

        if deleted.is_empty() {
            info!("no deleted files found");
            return Ok(outcome);
        }
        if self.confirm(&format!("Clean up {} deleted files?", deleted.len()))? {
            self.device.remove_ids(&deleted)?;
            for id in &deleted {
                self.index.remove(id);
            }
            outcome.removed = deleted;
        }
        Ok(outcome)
    }

    /// Remove stored files that have no metadata record at all.
    pub fn purge_orphans(&mut self) -> Result<PassOutcome> {
        info!("removing files without metadata");
        let mut outcome = PassOutcome::new(CleanupPass::Orphans);
        let orphans = self.device.list_orphans()?;
        outcome.found = orphans.len();

        if orphans.is_empty() {
            info!("no orphan files found");
            return Ok(outcome);
        }
        for file in &orphans {
            info!(file = %file, "orphan");
        }
        if self.confirm(&format!("Clean up {} orphaned files?", orphans.len()))? {
            self.device.remove_orphans(&orphans)?;
            outcome.removed = orphans;
        }
        Ok(outcome)
    }

    /// Keep one document per content fingerprint, as chosen by the operator.
    ///
    /// Removals are committed group by group; a stop signal aborts the
    /// remaining groups without undoing earlier ones.
    pub fn resolve_duplicates(&mut self) -> Result<PassOutcome> {
        let mut outcome = PassOutcome::new(CleanupPass::Duplicates);
        let listing = self.device.fingerprint_listing()?;
        let groups = duplicates::duplicate_groups(parse_fingerprints(&listing)?);
        let total = groups.len();
        info!(groups = total, "duplicate groups found");

        for (position, (fingerprint, ids)) in groups.into_iter().enumerate() {
            let mut candidates = Vec::with_capacity(ids.len());
            for id in &ids {
                let Some(record) = self.index.get(id) else {
                    warn!(id = %id, fingerprint = %fingerprint, "metadata missing for duplicate, skipping");
                    outcome.skipped += 1;
                    continue;
                };
                if record.kind != RecordKind::Document {
                    continue;
                }
                let path = match self.index.resolve_full_path(id) {
                    Ok(path) => path,
                    Err(e) => {
                        warn!(id = %id, "skipping duplicate candidate: {}", e);
                        outcome.skipped += 1;
                        continue;
                    }
                };
                candidates.push(Candidate::from_record(id, record, path)?);
            }
            if candidates.is_empty() {
                continue;
            }

            let request = choose_survivor(&fingerprint, candidates);
            outcome.found += request.candidates.len() - 1;
            let selection = if request.needs_operator() {
                loop {
                    let selection = self.operator.select(&request, position, total)?;
                    if request.accepts(selection) {
                        break selection;
                    }
                    warn!(
                        "enter a number from 0 to {}",
                        request.candidates.len() - 1
                    );
                }
            } else {
                info!(fingerprint = %fingerprint, "only one candidate left, keeping it");
                Selection::Default
            };

            match decide(&request, selection) {
                GroupDecision::Stop => {
                    info!("cleanup stopped");
                    break;
                }
                GroupDecision::Skip => {
                    info!(fingerprint = %fingerprint, "skipping this group");
                }
                GroupDecision::Resolve { keep, remove } => {
                    for id in &remove {
                        self.index.remove(id);
                        self.device.remove_ids(std::slice::from_ref(id))?;
                    }
                    info!(keep = %keep, removed = remove.len(), "duplicates removed");
                    outcome.removed.extend(remove);
                }
            }
        }

        info!(total = outcome.removed.len(), "duplicate removal finished");
        Ok(outcome)
    }

    /// Remove collections without children until none are left.
    ///
    /// Each scan completes before its finds are removed; removing a
    /// collection can leave its parent childless for the next scan. The plan
    /// is computed on a copy of the index and only committed on confirmation.
    pub fn purge_empty_collections(&mut self) -> Result<PassOutcome> {
        let mut outcome = PassOutcome::new(CleanupPass::EmptyCollections);
        let mut scratch = self.index.clone();
        let mut planned: Vec<DocumentId> = Vec::new();
        let mut broken: BTreeSet<DocumentId> = BTreeSet::new();

        loop {
            let mut found = Vec::new();
            for (id, record) in scratch.records() {
                if record.kind != RecordKind::Collection
                    || scratch.has_children(id)
                    || broken.contains(id)
                {
                    continue;
                }
                match scratch.resolve_full_path(id) {
                    Ok(path) => {
                        info!(path = %path, "empty collection");
                        found.push(id.clone());
                    }
                    Err(e) => {
                        warn!(id = %id, "skipping empty collection: {}", e);
                        broken.insert(id.clone());
                    }
                }
            }
            if found.is_empty() {
                break;
            }
            outcome.iterations += 1;
            for id in &found {
                scratch.remove(id);
            }
            planned.extend(found);
        }

        outcome.skipped = broken.len();
        outcome.found = planned.len();
        if planned.is_empty() {
            info!("no empty collections found");
            return Ok(outcome);
        }
        if self.confirm(&format!("Clean up {} empty directories?", planned.len()))? {
            self.device.remove_ids(&planned)?;
            *self.index = scratch;
            outcome.removed = planned;
        }
        Ok(outcome)
    }
}
