//! Tree builders
//!
//! [`PushBuilder`] mirrors a local source hierarchy and resolves each node
//! against the index, consulting the collision policy for documents that
//! already exist. [`PullBuilder`] expands named anchors from the index itself.

use super::{DocumentTree, NodeHandle, NodeKind};
use crate::error::{Result, SyncError};
use crate::metadata::{MetadataIndex, MetadataRecord};
use crate::policy::{resolve_collision, ExistingPolicy};
use crate::types::{is_supported_extension, DocumentId, RecordKind, ROOT_PARENT};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// One entry of a source hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceEntry {
    pub path: PathBuf,
    pub name: String,
    pub is_dir: bool,
    /// Extension without the dot, if any.
    pub extension: Option<String>,
}

/// Children of one directory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceListing {
    pub entries: Vec<SourceEntry>,
    /// Children that could not be described (dangling links, permissions).
    pub unreadable: Vec<(PathBuf, String)>,
}

/// Enumerates a hierarchy of directories and files to push.
pub trait SourceTree {
    /// Describe the entry at `path`.
    fn entry(&self, path: &Path) -> Result<SourceEntry>;
    /// Direct children of the directory at `path`.
    ///
    /// Fails only when the directory itself cannot be read.
    fn entries(&self, path: &Path) -> Result<SourceListing>;
}

/// [`SourceTree`] over the local filesystem, children sorted by file name.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSource;

impl FsSource {
    fn describe(path: &Path, is_dir: bool) -> SourceEntry {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        SourceEntry {
            path: path.to_path_buf(),
            name,
            is_dir,
            extension: path
                .extension()
                .map(|e| e.to_string_lossy().into_owned()),
        }
    }
}

impl SourceTree for FsSource {
    fn entry(&self, path: &Path) -> Result<SourceEntry> {
        let metadata = std::fs::metadata(path)?;
        // `.` and `..` have no file name of their own.
        let path = if path.file_name().is_none() {
            path.canonicalize()?
        } else {
            path.to_path_buf()
        };
        Ok(Self::describe(&path, metadata.is_dir()))
    }

    fn entries(&self, path: &Path) -> Result<SourceListing> {
        let mut listing = SourceListing::default();
        for entry in WalkDir::new(path)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
        {
            match entry {
                Ok(entry) => listing
                    .entries
                    .push(Self::describe(entry.path(), entry.file_type().is_dir())),
                Err(e) if e.depth() > 0 => {
                    let failed = e
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| path.to_path_buf());
                    listing.unreadable.push((failed, e.to_string()));
                }
                Err(e) => {
                    return Err(SyncError::Io(
                        e.into_io_error()
                            .unwrap_or_else(|| std::io::Error::other("filesystem loop")),
                    ))
                }
            }
        }
        Ok(listing)
    }
}

/// Source roots and the items dropped or skipped while building, kept for
/// planning and end-of-run reporting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildReport {
    /// Top-level nodes built from the push sources, below any destination chain.
    pub sources: Vec<NodeHandle>,
    pub unsupported: Vec<PathBuf>,
    pub unreadable: Vec<PathBuf>,
    pub empty_dirs: Vec<PathBuf>,
    pub missing_anchors: Vec<String>,
    pub ambiguous_anchors: Vec<String>,
    pub collisions: usize,
}

impl BuildReport {
    pub fn dropped(&self) -> usize {
        self.unsupported.len()
            + self.unreadable.len()
            + self.empty_dirs.len()
            + self.missing_anchors.len()
    }
}

/// Generate a fresh document identity.
pub fn generate_id() -> DocumentId {
    uuid::Uuid::new_v4().to_string()
}

/// Builds a tree from local files for upload.
pub struct PushBuilder<'a, S: SourceTree + ?Sized> {
    index: &'a MetadataIndex,
    source: &'a S,
    policy: ExistingPolicy,
    new_id: fn() -> DocumentId,
    report: BuildReport,
}

impl<'a, S: SourceTree + ?Sized> PushBuilder<'a, S> {
    pub fn new(index: &'a MetadataIndex, source: &'a S, policy: ExistingPolicy) -> Self {
        Self {
            index,
            source,
            policy,
            new_id: generate_id,
            report: BuildReport::default(),
        }
    }

    /// Override the identity generator used by the duplicate policy.
    pub fn with_id_generator(mut self, new_id: fn() -> DocumentId) -> Self {
        self.new_id = new_id;
        self
    }

    /// Build one tree for all `sources`.
    ///
    /// With a `destination` such as `Books/New`, the sources are placed below
    /// that chain of collections and the tree gets a single root.
    pub fn build(
        mut self,
        sources: &[PathBuf],
        destination: Option<&str>,
    ) -> Result<(DocumentTree, BuildReport)> {
        let mut tree = DocumentTree::new();

        let anchor = match destination {
            Some(dest) => {
                let mut root = None;
                let mut anchor: Option<NodeHandle> = None;
                for folder in dest.split('/').filter(|s| !s.is_empty()) {
                    let node = tree.create(folder, NodeKind::Collection, anchor, self.index);
                    match anchor {
                        Some(parent) => tree.attach(parent, node),
                        None => root = Some(node),
                    }
                    anchor = Some(node);
                }
                if let Some(root) = root {
                    tree.push_root(root);
                }
                anchor
            }
            None => None,
        };

        for source in sources {
            debug!(path = %source.display(), "scanning");
            let entry = self.source.entry(source)?;
            if let Some(node) = self.build_entry(&mut tree, entry, anchor)? {
                self.report.sources.push(node);
                match anchor {
                    Some(parent) => tree.attach(parent, node),
                    None => tree.push_root(node),
                }
            }
        }

        Ok((tree, self.report))
    }

    fn skip_unreadable(&mut self, path: PathBuf, reason: &str) {
        warn!(path = %path.display(), reason = %reason, "unreadable entry, ignored");
        self.report.unreadable.push(path);
    }

    fn build_entry(
        &mut self,
        tree: &mut DocumentTree,
        entry: SourceEntry,
        parent: Option<NodeHandle>,
    ) -> Result<Option<NodeHandle>> {
        if entry.is_dir {
            let listing = match self.source.entries(&entry.path) {
                Ok(listing) => listing,
                Err(SyncError::Io(e)) => {
                    self.skip_unreadable(entry.path, &e.to_string());
                    return Ok(None);
                }
                Err(e) => return Err(e),
            };
            let mark = tree.mark();
            let node = tree.create(entry.name.clone(), NodeKind::Collection, parent, self.index);
            for (path, reason) in listing.unreadable {
                self.skip_unreadable(path, &reason);
            }
            for child in listing.entries {
                debug!(path = %child.path.display(), "scanning");
                if let Some(child_node) = self.build_entry(tree, child, Some(node))? {
                    tree.attach(node, child_node);
                }
            }
            if tree.children(node).is_empty() {
                warn!(path = %entry.path.display(), "empty directory, ignored");
                tree.rollback(mark);
                self.report.empty_dirs.push(entry.path);
                return Ok(None);
            }
            return Ok(Some(node));
        }

        let filetype = entry
            .extension
            .as_deref()
            .filter(|ext| is_supported_extension(ext))
            .map(str::to_ascii_lowercase);
        let Some(filetype) = filetype else {
            warn!(path = %entry.path.display(), "unsupported file type, ignored");
            self.report.unsupported.push(entry.path);
            return Ok(None);
        };

        let node = tree.create(
            entry.name.clone(),
            NodeKind::document(Some(entry.path.clone()), filetype),
            parent,
            self.index,
        );
        if tree.node(node).exists_remotely {
            self.report.collisions += 1;
            let existing = tree.node(node).identity.clone().unwrap_or_default();
            let outcome = resolve_collision(&existing, self.policy, self.new_id);
            info!(
                path = %tree.full_path(node),
                policy = %self.policy,
                "document already on device"
            );
            outcome.apply(tree.node_mut(node));
        }
        Ok(Some(node))
    }
}

/// Builds trees below named anchors straight from the index.
pub struct PullBuilder<'a> {
    index: &'a MetadataIndex,
    report: BuildReport,
}

/// Display name used for a pulled document on the local filesystem.
pub fn local_document_name(name: &str) -> String {
    if name.ends_with(".pdf") {
        name.to_string()
    } else {
        format!("{name}.pdf")
    }
}

impl<'a> PullBuilder<'a> {
    pub fn new(index: &'a MetadataIndex) -> Self {
        Self {
            index,
            report: BuildReport::default(),
        }
    }

    /// Build one root per resolvable anchor.
    ///
    /// An anchor `a/b/target` is looked up by its last component; the
    /// leading components become local collections that only contribute to
    /// the anchor's path (for exclude matching) and are not roots themselves.
    pub fn build(mut self, anchors: &[String]) -> Result<(DocumentTree, BuildReport)> {
        let mut tree = DocumentTree::new();
        for anchor in anchors {
            if let Some(node) = self.build_anchor(&mut tree, anchor) {
                self.expand(&mut tree, node);
                tree.push_root(node);
            }
        }
        Ok((tree, self.report))
    }

    /// Build one root per root-level record, for a full backup.
    pub fn build_all(self) -> Result<(DocumentTree, BuildReport)> {
        let mut tree = DocumentTree::new();
        for (id, record) in self.index.children_of(ROOT_PARENT) {
            let node = self.resolved_node(&mut tree, id, record, None);
            if record.kind.is_collection() {
                self.expand(&mut tree, node);
            }
            tree.push_root(node);
        }
        Ok((tree, self.report))
    }

    fn resolved_node(
        &self,
        tree: &mut DocumentTree,
        id: &DocumentId,
        record: &MetadataRecord,
        parent: Option<NodeHandle>,
    ) -> NodeHandle {
        match record.kind {
            RecordKind::Collection => tree.create_resolved(
                record.visible_name.clone(),
                NodeKind::Collection,
                parent,
                id.clone(),
            ),
            RecordKind::Document => tree.create_resolved(
                local_document_name(&record.visible_name),
                NodeKind::document(None, "pdf"),
                parent,
                id.clone(),
            ),
        }
    }

    fn build_anchor(&mut self, tree: &mut DocumentTree, anchor: &str) -> Option<NodeHandle> {
        let parts: Vec<&str> = anchor.split('/').filter(|s| !s.is_empty()).collect();
        let (target, parents) = parts.split_last()?;

        let candidates = self.index.find_by_name(target);
        if candidates.is_empty() {
            warn!(anchor = %anchor, "cannot find anchor, skipping");
            self.report.missing_anchors.push(anchor.to_string());
            return None;
        }

        let wanted = format!("/{}", parts.join("/"));
        let exact = candidates.iter().find(|(id, _)| {
            self.index
                .resolve_full_path(id)
                .map(|path| path == wanted)
                .unwrap_or(false)
        });
        let (id, record) = match exact {
            Some(found) => *found,
            None => {
                if candidates.len() > 1 {
                    warn!(
                        anchor = %anchor,
                        candidates = candidates.len(),
                        "anchor name is ambiguous, using the first match"
                    );
                    self.report.ambiguous_anchors.push(anchor.to_string());
                }
                candidates[0]
            }
        };

        let mut local_parent = None;
        for name in parents {
            let node = tree.create_local(*name, NodeKind::Collection, local_parent);
            if let Some(p) = local_parent {
                tree.attach(p, node);
            }
            local_parent = Some(node);
        }

        let node = self.resolved_node(tree, id, record, local_parent);
        if let Some(p) = local_parent {
            tree.attach(p, node);
        }
        Some(node)
    }

    fn expand(&self, tree: &mut DocumentTree, node: NodeHandle) {
        let Some(id) = tree.node(node).identity.clone() else {
            return;
        };
        for (child_id, record) in self.index.children_of(&id) {
            let child = self.resolved_node(tree, child_id, record, Some(node));
            tree.attach(node, child);
            if record.kind.is_collection() {
                self.expand(tree, child);
            }
        }
    }
}
