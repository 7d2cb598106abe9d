//! Staging renderer
//!
//! Turns a pruned push tree into the files the device expects, keyed by
//! identity: `<id>.metadata`, `<id>.content`, `<id>/`, `<id>.thumbnails/`
//! and the payload `<id>.<ext>`.

use crate::error::Result;
use crate::metadata::MetadataRecord;
use crate::policy::RenderStrategy;
use crate::tree::builder::generate_id;
use crate::tree::{DocumentTree, NodeHandle, NodeKind};
use crate::types::ROOT_PARENT;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// What was written to the staging directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderReport {
    pub collections: usize,
    pub documents: usize,
    pub payload_only: usize,
}

impl RenderReport {
    pub fn is_empty(&self) -> bool {
        self.collections + self.documents + self.payload_only == 0
    }
}

pub struct Renderer {
    staging: PathBuf,
    now_millis: i64,
}

impl Renderer {
    pub fn new(staging: impl Into<PathBuf>) -> Self {
        Self {
            staging: staging.into(),
            now_millis: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Fix the timestamp written into new metadata records.
    pub fn with_timestamp(mut self, now_millis: i64) -> Self {
        self.now_millis = now_millis;
        self
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging
    }

    /// Render every root of `tree`, assigning identities where absent.
    pub fn render(&self, tree: &mut DocumentTree) -> Result<RenderReport> {
        fs::create_dir_all(&self.staging)?;
        let mut report = RenderReport::default();
        let roots = tree.roots().to_vec();
        for root in roots {
            self.render_node(tree, root, &mut report)?;
        }
        info!(
            staging = %self.staging.display(),
            collections = report.collections,
            documents = report.documents,
            payload_only = report.payload_only,
            "staging complete"
        );
        Ok(report)
    }

    fn render_node(
        &self,
        tree: &mut DocumentTree,
        handle: NodeHandle,
        report: &mut RenderReport,
    ) -> Result<()> {
        let node = tree.node(handle);
        let writes_files = !node.is_upload_skipped();
        if writes_files && node.identity.is_none() {
            tree.node_mut(handle).identity = Some(generate_id());
        }

        if writes_files {
            let node = tree.node(handle);
            let id = node.identity.clone().unwrap_or_default();
            debug!(path = %tree.full_path(handle), id = %id, "preparing for upload");
            match (&node.kind, node.render) {
                (_, RenderStrategy::Skip) => {}
                (NodeKind::Collection, _) => {
                    self.write_common(tree, handle, &id)?;
                    report.collections += 1;
                }
                (NodeKind::Document { source, filetype }, RenderStrategy::Full) => {
                    let (source, filetype) = (source.clone(), filetype.clone());
                    self.write_common(tree, handle, &id)?;
                    fs::create_dir_all(self.staging.join(&id))?;
                    fs::create_dir_all(self.staging.join(format!("{id}.thumbnails")))?;
                    self.copy_payload(source.as_deref(), &id, &filetype)?;
                    report.documents += 1;
                }
                (NodeKind::Document { source, filetype }, RenderStrategy::ContentOnly) => {
                    let (source, filetype) = (source.clone(), filetype.clone());
                    self.copy_payload(source.as_deref(), &id, &filetype)?;
                    report.payload_only += 1;
                }
            }
        }

        let children = tree.children(handle).to_vec();
        for child in children {
            self.render_node(tree, child, report)?;
        }
        Ok(())
    }

    fn write_common(&self, tree: &DocumentTree, handle: NodeHandle, id: &str) -> Result<()> {
        let node = tree.node(handle);
        let parent_id = node
            .parent()
            .and_then(|p| tree.node(p).identity.clone())
            .unwrap_or_else(|| ROOT_PARENT.to_string());
        let record = MetadataRecord::new(
            node.kind.record_kind(),
            &node.name,
            &parent_id,
            self.now_millis,
        );
        fs::write(
            self.staging.join(format!("{id}.metadata")),
            serde_json::to_string_pretty(&record)?,
        )?;
        fs::write(self.staging.join(format!("{id}.content")), "{}")?;
        Ok(())
    }

    fn copy_payload(&self, source: Option<&Path>, id: &str, filetype: &str) -> Result<()> {
        let Some(source) = source else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("document {id} has no local payload"),
            )
            .into());
        };
        fs::copy(source, self.staging.join(format!("{id}.{filetype}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetadataIndex;
    use crate::policy::{resolve_collision, ExistingPolicy};
    use crate::types::RecordKind;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        let payload = temp.path().join("paper.pdf");
        fs::write(&payload, b"%PDF-1.4").unwrap();
        (temp, payload)
    }

    fn staged(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_render_new_folder_and_document() {
        let (temp, payload) = setup();
        let index = MetadataIndex::new();
        let mut tree = DocumentTree::new();
        let folder = tree.create("Papers", NodeKind::Collection, None, &index);
        let doc = tree.create(
            "paper.pdf",
            NodeKind::document(Some(payload), "pdf"),
            Some(folder),
            &index,
        );
        tree.attach(folder, doc);
        tree.push_root(folder);

        let staging = temp.path().join("stage");
        let report = Renderer::new(&staging)
            .with_timestamp(1000)
            .render(&mut tree)
            .unwrap();
        assert_eq!(report.collections, 1);
        assert_eq!(report.documents, 1);

        let folder_id = tree.node(folder).identity.clone().unwrap();
        let doc_id = tree.node(doc).identity.clone().unwrap();
        let names = staged(&staging);
        assert_eq!(names.len(), 7);
        assert!(names.contains(&format!("{doc_id}.pdf")));
        assert!(names.contains(&format!("{doc_id}.thumbnails")));
        assert!(names.contains(&format!("{folder_id}.content")));

        let meta: MetadataRecord = serde_json::from_str(
            &fs::read_to_string(staging.join(format!("{doc_id}.metadata"))).unwrap(),
        )
        .unwrap();
        assert_eq!(meta.parent, folder_id);
        assert_eq!(meta.kind, RecordKind::Document);
        assert_eq!(meta.last_modified, "1000");
    }

    #[test]
    fn test_render_skips_existing_and_doconly_writes_payload() {
        let (temp, payload) = setup();
        let mut tree = DocumentTree::new();
        let existing = tree.create_resolved(
            "Papers",
            NodeKind::Collection,
            None,
            "folder-id".to_string(),
        );
        let doc = tree.create_local(
            "paper.pdf",
            NodeKind::document(Some(payload), "pdf"),
            Some(existing),
        );
        resolve_collision("doc-id", ExistingPolicy::DocOnly, || unreachable!())
            .apply(tree.node_mut(doc));
        tree.attach(existing, doc);
        tree.push_root(existing);

        let staging = temp.path().join("stage");
        let report = Renderer::new(&staging).render(&mut tree).unwrap();
        assert_eq!(report.payload_only, 1);
        assert_eq!(report.collections, 0);
        assert_eq!(staged(&staging), vec!["doc-id.pdf".to_string()]);
    }
}
