//! Document tree
//!
//! In-memory hierarchy of collections and documents, stored as an arena of
//! [`Node`]s addressed by [`NodeHandle`]. A node's `children` list owns the
//! subtree below it; its `parent` handle is only used to rebuild paths.

pub mod builder;
pub mod exclude;
pub mod node;

pub use builder::{
    BuildReport, FsSource, PullBuilder, PushBuilder, SourceEntry, SourceListing, SourceTree,
};
pub use exclude::ExcludePatterns;
pub use node::{Node, NodeHandle, NodeKind};

use crate::metadata::MetadataIndex;
use crate::types::{DocumentId, ROOT_PARENT};
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct DocumentTree {
    nodes: Vec<Node>,
    roots: Vec<NodeHandle>,
}

impl DocumentTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached node and resolve its identity against the index.
    ///
    /// The lookup key is the already-resolved identity of `parent`, or the
    /// root key for top-level nodes. A parent without identity does not exist
    /// on the device, so neither can its children.
    pub fn create(
        &mut self,
        name: impl Into<String>,
        kind: NodeKind,
        parent: Option<NodeHandle>,
        index: &MetadataIndex,
    ) -> NodeHandle {
        let handle = self.create_local(name, kind, parent);
        let parent_key = match parent {
            None => Some(ROOT_PARENT),
            Some(p) => self.nodes[p.0].identity.as_deref(),
        };
        let resolved = parent_key
            .and_then(|key| index.lookup(&self.nodes[handle.0].name, key))
            .map(|(id, _)| id.clone());
        if let Some(id) = resolved {
            let node = &mut self.nodes[handle.0];
            node.identity = Some(id);
            node.exists_remotely = true;
        }
        handle
    }

    /// Create a detached node for an item already known to exist remotely.
    pub fn create_resolved(
        &mut self,
        name: impl Into<String>,
        kind: NodeKind,
        parent: Option<NodeHandle>,
        identity: DocumentId,
    ) -> NodeHandle {
        let handle = self.create_local(name, kind, parent);
        let node = &mut self.nodes[handle.0];
        node.identity = Some(identity);
        node.exists_remotely = true;
        handle
    }

    /// Create a detached node without consulting the index.
    pub fn create_local(
        &mut self,
        name: impl Into<String>,
        kind: NodeKind,
        parent: Option<NodeHandle>,
    ) -> NodeHandle {
        let handle = NodeHandle(self.nodes.len());
        self.nodes.push(Node::new(name.into(), kind, parent));
        handle
    }

    /// Append `child` to `parent`'s children; the child must point back at `parent`.
    pub fn attach(&mut self, parent: NodeHandle, child: NodeHandle) {
        debug_assert_eq!(self.nodes[child.0].parent, Some(parent));
        self.nodes[parent.0].children.push(child);
    }

    pub fn push_root(&mut self, root: NodeHandle) {
        self.roots.push(root);
    }

    pub fn roots(&self) -> &[NodeHandle] {
        &self.roots
    }

    pub fn node(&self, handle: NodeHandle) -> &Node {
        &self.nodes[handle.0]
    }

    pub fn node_mut(&mut self, handle: NodeHandle) -> &mut Node {
        &mut self.nodes[handle.0]
    }

    pub fn children(&self, handle: NodeHandle) -> &[NodeHandle] {
        &self.nodes[handle.0].children
    }

    /// Number of arena slots; used as a rollback mark by the builders.
    pub(crate) fn mark(&self) -> usize {
        self.nodes.len()
    }

    /// Drop every node created since `mark`.
    pub(crate) fn rollback(&mut self, mark: usize) {
        self.nodes.truncate(mark);
    }

    /// Names from the topmost ancestor down to `handle`, joined with `/`.
    pub fn full_path(&self, handle: NodeHandle) -> String {
        let mut names = Vec::new();
        let mut current = Some(handle);
        while let Some(h) = current {
            let node = &self.nodes[h.0];
            names.push(node.name.as_str());
            current = node.parent;
        }
        names.reverse();
        names.join("/")
    }

    /// Pre-order handles of the subtree rooted at `handle`.
    pub fn descendants(&self, handle: NodeHandle) -> Vec<NodeHandle> {
        let mut out = Vec::new();
        let mut stack = vec![handle];
        while let Some(h) = stack.pop() {
            out.push(h);
            stack.extend(self.nodes[h.0].children.iter().rev().copied());
        }
        out
    }

    /// Pre-order handles of every node reachable from the roots.
    pub fn iter(&self) -> impl Iterator<Item = NodeHandle> + '_ {
        self.roots.iter().flat_map(move |&root| self.descendants(root))
    }

    /// Cut every subtree whose path matches an exclude pattern.
    ///
    /// Returns true when `handle` itself matches; the subtree is then left
    /// untouched and the caller decides what to do with it.
    pub fn curb(&mut self, handle: NodeHandle, excludes: &ExcludePatterns) -> bool {
        let path = self.full_path(handle);
        if excludes.matches(&path) {
            debug!(path = %path, "curbing");
            return true;
        }

        let children = std::mem::take(&mut self.nodes[handle.0].children);
        let kept = children
            .into_iter()
            .filter(|&child| !self.curb(child, excludes))
            .collect();
        self.nodes[handle.0].children = kept;
        false
    }

    /// Curb every root and drop the roots that are excluded outright.
    pub fn prune(&mut self, excludes: &ExcludePatterns) -> Vec<String> {
        if excludes.is_empty() {
            return Vec::new();
        }
        let roots = std::mem::take(&mut self.roots);
        let mut dropped = Vec::new();
        for root in roots {
            if self.curb(root, excludes) {
                dropped.push(self.full_path(root));
            } else {
                self.roots.push(root);
            }
        }
        dropped
    }
}
