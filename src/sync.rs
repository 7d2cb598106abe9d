//! Push, pull and backup workflows
//!
//! Each workflow is split into a planning step that only reads the index and
//! a step that touches the device or the local filesystem, so the caller can
//! show the plan and stop there on a dry run.

use crate::device::Device;
use crate::error::{Result, SyncError};
use crate::metadata::MetadataIndex;
use crate::policy::{plan_missing_removals, ExistingPolicy, MissingPolicy};
use crate::render::{RenderReport, Renderer};
use crate::tree::builder::generate_id;
use crate::tree::{
    BuildReport, DocumentTree, ExcludePatterns, NodeHandle, PullBuilder, PushBuilder, SourceTree,
};
use crate::types::DocumentId;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Read the device's metadata once and index it.
pub fn load_index<D: Device + ?Sized>(device: &mut D) -> Result<MetadataIndex> {
    let index = MetadataIndex::load(device.fetch_metadata()?)?;
    info!(records = index.len(), trashed = index.trashed().count(), "index loaded");
    Ok(index)
}

/// Settings shared by the push planner.
#[derive(Debug, Clone)]
pub struct PushRequest {
    pub sources: Vec<PathBuf>,
    /// Collection chain such as `Books/New` to push into.
    pub destination: Option<String>,
    pub if_exists: ExistingPolicy,
    pub if_does_not_exist: MissingPolicy,
}

#[derive(Debug)]
pub struct PushPlan {
    pub tree: DocumentTree,
    pub build: BuildReport,
    /// Tree paths removed by exclude patterns at the root level.
    pub excluded: Vec<String>,
    /// Remote ids to delete because their local source is gone.
    pub removals: Vec<DocumentId>,
}

impl PushPlan {
    pub fn is_noop(&self) -> bool {
        self.removals.is_empty()
            && self
                .tree
                .iter()
                .all(|h| self.tree.node(h).is_upload_skipped())
    }
}

pub fn plan_push<S: SourceTree + ?Sized>(
    index: &MetadataIndex,
    source: &S,
    request: &PushRequest,
    excludes: &ExcludePatterns,
) -> Result<PushPlan> {
    let (mut tree, build) = PushBuilder::new(index, source, request.if_exists)
        .build(&request.sources, request.destination.as_deref())?;
    let excluded = tree.prune(excludes);
    for path in &excluded {
        info!(path = %path, "excluded");
    }
    let removals = match request.if_does_not_exist {
        MissingPolicy::Delete => plan_missing_removals(&tree, &build.sources, index, excludes),
        MissingPolicy::Skip => Vec::new(),
    };
    Ok(PushPlan {
        tree,
        build,
        excluded,
        removals,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushOutcome {
    pub rendered: RenderReport,
    pub removed: Vec<DocumentId>,
    pub restarted: bool,
}

/// Render the plan into `staging`, upload it, delete the planned removals
/// and restart the document service if the store changed.
pub fn execute_push<D: Device + ?Sized>(
    device: &mut D,
    plan: &mut PushPlan,
    staging: &Path,
) -> Result<PushOutcome> {
    let rendered = Renderer::new(staging).render(&mut plan.tree)?;
    let mut outcome = PushOutcome {
        rendered,
        ..PushOutcome::default()
    };

    if !outcome.rendered.is_empty() {
        device.upload(staging)?;
    }
    if !plan.removals.is_empty() {
        info!(count = plan.removals.len(), "removing items missing locally");
        device.remove_ids(&plan.removals)?;
        outcome.removed = plan.removals.clone();
    }
    if !outcome.rendered.is_empty() || !outcome.removed.is_empty() {
        device.restart()?;
        outcome.restarted = true;
    }
    Ok(outcome)
}

/// Where rendered files go before upload.
pub enum Staging {
    /// A directory that survives the run.
    Kept(PathBuf),
    Temporary(TempDir),
}

impl Staging {
    /// Use `configured` if given, otherwise a fresh temporary directory that
    /// is removed on drop unless `keep` is set.
    pub fn prepare(configured: Option<&Path>, keep: bool) -> Result<Self> {
        if let Some(dir) = configured {
            if dir.exists() && fs::read_dir(dir)?.next().is_some() {
                return Err(SyncError::ConfigError(format!(
                    "transfer directory {} is not empty",
                    dir.display()
                )));
            }
            fs::create_dir_all(dir)?;
            return Ok(Staging::Kept(dir.to_path_buf()));
        }
        if keep {
            let path = std::env::temp_dir().join(format!("resync-{}", generate_id()));
            fs::create_dir_all(&path)?;
            info!(path = %path.display(), "keeping staging directory");
            return Ok(Staging::Kept(path));
        }
        let temp = tempfile::Builder::new().prefix("resync-").tempdir()?;
        Ok(Staging::Temporary(temp))
    }

    pub fn path(&self) -> &Path {
        match self {
            Staging::Kept(path) => path,
            Staging::Temporary(temp) => temp.path(),
        }
    }
}

/// Only `skip` and `overwrite` make sense for files on the local side.
pub fn check_pull_policy(policy: ExistingPolicy) -> Result<()> {
    match policy {
        ExistingPolicy::Skip | ExistingPolicy::Overwrite => Ok(()),
        other => Err(SyncError::ConfigError(format!(
            "--if-exists={other} is not supported when pulling (use skip or overwrite)"
        ))),
    }
}

#[derive(Debug)]
pub struct PullPlan {
    pub tree: DocumentTree,
    pub build: BuildReport,
    pub excluded: Vec<String>,
}

/// Resolve `anchors` (`a/b/target`) against the index and prune the result.
pub fn plan_pull(
    index: &MetadataIndex,
    anchors: &[String],
    excludes: &ExcludePatterns,
) -> Result<PullPlan> {
    let (mut tree, build) = PullBuilder::new(index).build(anchors)?;
    let excluded = tree.prune(excludes);
    Ok(PullPlan {
        tree,
        build,
        excluded,
    })
}

/// Pull every root-level item.
pub fn plan_backup(index: &MetadataIndex, excludes: &ExcludePatterns) -> Result<PullPlan> {
    let (mut tree, build) = PullBuilder::new(index).build_all()?;
    let excluded = tree.prune(excludes);
    Ok(PullPlan {
        tree,
        build,
        excluded,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadReport {
    pub directories: usize,
    pub downloaded: Vec<PathBuf>,
    pub skipped_existing: Vec<PathBuf>,
    /// Tree paths whose name cannot be used as a local file name; their
    /// subtrees are not downloaded.
    pub rejected_names: Vec<String>,
}

/// A device-provided name is used as a single path component only.
pub fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

/// Materialize `tree` below `target_root`: collections become directories
/// and documents are fetched from the device.
///
/// Local paths are built one validated name at a time and never leave
/// `target_root`.
pub fn download_tree<D: Device + ?Sized>(
    device: &mut D,
    tree: &DocumentTree,
    target_root: &Path,
    if_exists: ExistingPolicy,
    dry_run: bool,
) -> Result<DownloadReport> {
    check_pull_policy(if_exists)?;
    let mut report = DownloadReport::default();
    let mut stack = Vec::new();
    for &root in tree.roots().iter().rev() {
        match local_parent_dir(tree, root, target_root) {
            Some(dir) => stack.push((root, dir)),
            None => {
                let path = tree.full_path(root);
                warn!(path = %path, "unusable local name above anchor, skipping");
                report.rejected_names.push(path);
            }
        }
    }
    while let Some((handle, parent_dir)) = stack.pop() {
        let node = tree.node(handle);
        if !is_safe_file_name(&node.name) {
            let path = tree.full_path(handle);
            warn!(path = %path, name = ?node.name, "unusable local name, skipping subtree");
            report.rejected_names.push(path);
            continue;
        }
        let path = parent_dir.join(&node.name);
        download_node(device, tree, handle, &path, if_exists, dry_run, &mut report)?;
        stack.extend(
            tree.children(handle)
                .iter()
                .rev()
                .map(|&child| (child, path.clone())),
        );
    }
    Ok(report)
}

/// Directory for a root whose tree parents are local-only collections
/// (`a/b` of an anchor `a/b/target`).
fn local_parent_dir(
    tree: &DocumentTree,
    root: NodeHandle,
    target_root: &Path,
) -> Option<PathBuf> {
    let mut names = Vec::new();
    let mut current = tree.node(root).parent();
    while let Some(handle) = current {
        let node = tree.node(handle);
        if !is_safe_file_name(&node.name) {
            return None;
        }
        names.push(node.name.as_str());
        current = node.parent();
    }
    Some(names.iter().rev().fold(target_root.to_path_buf(), |dir, name| dir.join(name)))
}

fn download_node<D: Device + ?Sized>(
    device: &mut D,
    tree: &DocumentTree,
    handle: NodeHandle,
    path: &Path,
    if_exists: ExistingPolicy,
    dry_run: bool,
    report: &mut DownloadReport,
) -> Result<()> {
    let node = tree.node(handle);

    if node.is_collection() {
        if !path.is_dir() {
            debug!(path = %path.display(), "creating directory");
            if !dry_run {
                fs::create_dir_all(path)?;
            }
            report.directories += 1;
        }
        return Ok(());
    }

    let Some(id) = node.identity.as_deref() else {
        warn!(path = %path.display(), "document without identity, skipping");
        return Ok(());
    };
    if path.exists() && if_exists == ExistingPolicy::Skip {
        info!(path = %path.display(), "already exists, skipping");
        report.skipped_existing.push(path.to_path_buf());
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        if !dry_run {
            fs::create_dir_all(parent)?;
        }
    }
    info!(path = %path.display(), "downloading");
    device.download_document(id, path)?;
    report.downloaded.push(path.to_path_buf());
    Ok(())
}
