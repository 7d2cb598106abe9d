//! Document tree node types

use crate::policy::RenderStrategy;
use crate::types::{DocumentId, RecordKind};
use std::path::PathBuf;

/// Handle to a node in a [`super::DocumentTree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(pub(crate) usize);

/// What a node stands for.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Collection,
    Document {
        /// Local payload for pushed documents; `None` for nodes built from the index.
        source: Option<PathBuf>,
        /// Payload extension without the dot (`pdf`, `epub`).
        filetype: String,
    },
}

impl NodeKind {
    pub fn document(source: Option<PathBuf>, filetype: impl Into<String>) -> Self {
        NodeKind::Document {
            source,
            filetype: filetype.into(),
        }
    }

    pub fn record_kind(&self) -> RecordKind {
        match self {
            NodeKind::Collection => RecordKind::Collection,
            NodeKind::Document { .. } => RecordKind::Document,
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, NodeKind::Collection)
    }
}

/// A collection or document in the tree.
///
/// `parent` is a back-reference used for path reconstruction only; the
/// parent's `children` list is what owns the subtree.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    pub identity: Option<DocumentId>,
    pub exists_remotely: bool,
    pub pending_modification: bool,
    pub render: RenderStrategy,
    pub(crate) parent: Option<NodeHandle>,
    pub(crate) children: Vec<NodeHandle>,
}

impl Node {
    pub(crate) fn new(name: String, kind: NodeKind, parent: Option<NodeHandle>) -> Self {
        Self {
            name,
            kind,
            identity: None,
            exists_remotely: false,
            pending_modification: false,
            render: RenderStrategy::Full,
            parent,
            children: Vec::new(),
        }
    }

    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    pub fn children(&self) -> &[NodeHandle] {
        &self.children
    }

    pub fn is_collection(&self) -> bool {
        self.kind.is_collection()
    }

    /// True when rendering would write nothing for this node itself.
    pub fn is_upload_skipped(&self) -> bool {
        self.exists_remotely || self.render == RenderStrategy::Skip
    }
}
