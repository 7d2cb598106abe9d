//! Sync policies
//!
//! Pure decision logic for what happens to a pushed document that already
//! exists on the device, and for remote items whose local source is gone.

use crate::metadata::MetadataIndex;
use crate::tree::{DocumentTree, ExcludePatterns, Node, NodeHandle};
use crate::types::DocumentId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Behaviour when a pushed document collides with an existing item.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ExistingPolicy {
    /// Leave the existing item alone.
    #[default]
    Skip,
    /// Replace the existing item's metadata and content.
    Overwrite,
    /// Replace only the document payload, keeping metadata and renderings.
    #[value(name = "doconly")]
    #[serde(rename = "doconly")]
    DocOnly,
    /// Upload as a new item next to the existing one.
    Duplicate,
}

impl fmt::Display for ExistingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExistingPolicy::Skip => "skip",
            ExistingPolicy::Overwrite => "overwrite",
            ExistingPolicy::DocOnly => "doconly",
            ExistingPolicy::Duplicate => "duplicate",
        };
        f.write_str(name)
    }
}

/// Behaviour for remote items whose local counterpart is absent.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum MissingPolicy {
    #[default]
    Skip,
    Delete,
}

/// How a node is written to the staging directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RenderStrategy {
    /// Metadata, content placeholder, auxiliary directories and payload.
    #[default]
    Full,
    /// Payload file only; the existing metadata and renderings stay.
    ContentOnly,
    /// Nothing is written.
    Skip,
}

/// Node state decided for a collision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollisionOutcome {
    pub identity: DocumentId,
    pub exists_remotely: bool,
    pub pending_modification: bool,
    pub render: RenderStrategy,
}

impl CollisionOutcome {
    pub fn apply(self, node: &mut Node) {
        node.identity = Some(self.identity);
        node.exists_remotely = self.exists_remotely;
        node.pending_modification = self.pending_modification;
        node.render = self.render;
    }
}

/// Decide the node state for a document that matches `existing` on the device.
///
/// Overwrite and doconly treat the item as absent so it is rendered again,
/// but keep its id so the rendered files replace the existing ones.
/// Duplicate always asks `new_id` for a fresh identity.
pub fn resolve_collision(
    existing: &str,
    policy: ExistingPolicy,
    new_id: impl FnOnce() -> DocumentId,
) -> CollisionOutcome {
    match policy {
        ExistingPolicy::Skip => CollisionOutcome {
            identity: existing.to_string(),
            exists_remotely: true,
            pending_modification: false,
            render: RenderStrategy::Skip,
        },
        ExistingPolicy::Overwrite => CollisionOutcome {
            identity: existing.to_string(),
            exists_remotely: false,
            pending_modification: true,
            render: RenderStrategy::Full,
        },
        ExistingPolicy::DocOnly => CollisionOutcome {
            identity: existing.to_string(),
            exists_remotely: false,
            pending_modification: true,
            render: RenderStrategy::ContentOnly,
        },
        ExistingPolicy::Duplicate => {
            let mut identity = new_id();
            while identity == existing {
                identity = crate::tree::builder::generate_id();
            }
            CollisionOutcome {
                identity,
                exists_remotely: false,
                pending_modification: false,
                render: RenderStrategy::Full,
            }
        }
    }
}

/// Remote items below pushed collections that have no local counterpart.
///
/// Only collections inside `sources` (the nodes built from the push
/// arguments) that exist remotely are compared; a destination chain above
/// them is not. Items whose tree path matches an exclude pattern are kept.
/// Returned ids include every descendant of a missing collection, children
/// before parents.
pub fn plan_missing_removals(
    tree: &DocumentTree,
    sources: &[NodeHandle],
    index: &MetadataIndex,
    excludes: &ExcludePatterns,
) -> Vec<DocumentId> {
    let reachable: BTreeSet<NodeHandle> = tree.iter().collect();
    let mut planned = Vec::new();
    for &source in sources.iter().filter(|h| reachable.contains(h)) {
        for handle in tree.descendants(source) {
            let node = tree.node(handle);
            if !node.is_collection() || !node.exists_remotely {
                continue;
            }
            let Some(id) = node.identity.as_deref() else {
                continue;
            };
            let present: BTreeSet<&str> = tree
                .children(handle)
                .iter()
                .map(|&c| tree.node(c).name.as_str())
                .collect();
            let base = tree.full_path(handle);
            for (child_id, record) in index.children_of(id) {
                if present.contains(record.visible_name.as_str()) {
                    continue;
                }
                if excludes.matches(&format!("{}/{}", base, record.visible_name)) {
                    continue;
                }
                collect_subtree(index, child_id, &mut planned);
            }
        }
    }
    planned
}

fn collect_subtree(index: &MetadataIndex, id: &str, out: &mut Vec<DocumentId>) {
    for (child_id, _) in index.children_of(id) {
        collect_subtree(index, child_id, out);
    }
    out.push(id.to_string());
}

/// Nodes of a pushed tree that will be uploaded, for reporting.
pub fn upload_set(tree: &DocumentTree) -> Vec<NodeHandle> {
    tree.iter()
        .filter(|&h| !tree.node(h).is_upload_skipped())
        .collect()
}
