//! Document store in a local directory (a mounted device or a backup copy).

use super::{check_id, id_of_file, Device};
use crate::error::{Result, SyncError};
use crate::metadata::MetadataRecord;
use crate::types::DocumentId;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

pub struct LocalDevice {
    root: PathBuf,
    dry_run: bool,
    /// Payload digests computed during this run.
    digests: HashMap<PathBuf, String>,
}

impl LocalDevice {
    pub fn new(root: impl Into<PathBuf>, dry_run: bool) -> Self {
        Self {
            root: root.into(),
            dry_run,
            digests: HashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File names in the store root, sorted.
    fn file_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    fn remove_path(&self, path: &Path) -> Result<()> {
        if self.dry_run {
            info!(path = %path.display(), "dry run: would remove");
            return Ok(());
        }
        debug!(path = %path.display(), "removing");
        if path.is_dir() {
            fs::remove_dir_all(path)?;
        } else {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

impl Device for LocalDevice {
    fn fetch_metadata(&mut self) -> Result<Vec<(DocumentId, MetadataRecord)>> {
        let mut records = Vec::new();
        for name in self.file_names()? {
            let Some(id) = name.strip_suffix(".metadata") else {
                continue;
            };
            let text = fs::read_to_string(self.root.join(&name))?;
            let record: MetadataRecord = serde_json::from_str(&text)?;
            records.push((id.to_string(), record));
        }
        info!(count = records.len(), "metadata retrieved");
        Ok(records)
    }

    fn fingerprint_listing(&mut self) -> Result<String> {
        let mut listing = String::new();
        for name in self.file_names()? {
            if !name.ends_with(".pdf") {
                continue;
            }
            let path = self.root.join(&name);
            let digest = match self.digests.get(&path).cloned() {
                Some(d) => d,
                None => {
                    let hash = blake3::hash(&fs::read(&path)?);
                    let d = hex::encode(hash.as_bytes());
                    self.digests.insert(path.clone(), d.clone());
                    d
                }
            };
            listing.push_str(&format!("{}  {}\n", digest, path.display()));
        }
        Ok(listing)
    }

    fn list_orphans(&mut self) -> Result<Vec<String>> {
        Ok(self
            .file_names()?
            .into_iter()
            .filter(|name| {
                !self
                    .root
                    .join(format!("{}.metadata", id_of_file(name)))
                    .exists()
            })
            .collect())
    }

    fn remove_orphans(&mut self, files: &[String]) -> Result<()> {
        for name in files {
            self.remove_path(&self.root.join(name))?;
        }
        Ok(())
    }

    fn remove_ids(&mut self, ids: &[DocumentId]) -> Result<()> {
        for id in ids {
            check_id(id)?;
        }
        for name in self.file_names()? {
            if ids.iter().any(|id| id_of_file(&name) == id) {
                self.remove_path(&self.root.join(&name))?;
            }
        }
        Ok(())
    }

    fn upload(&mut self, staging: &Path) -> Result<()> {
        if self.dry_run {
            info!(staging = %staging.display(), "dry run: would copy staged files");
            return Ok(());
        }
        for entry in WalkDir::new(staging).min_depth(1) {
            let entry = entry.map_err(|e| {
                SyncError::Io(
                    e.into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("filesystem loop")),
                )
            })?;
            let relative = entry.path().strip_prefix(staging).map_err(|e| {
                SyncError::ConfigError(format!("staged file outside staging dir: {e}"))
            })?;
            let target = self.root.join(relative);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&target)?;
            } else {
                fs::copy(entry.path(), &target)?;
            }
        }
        Ok(())
    }

    fn download_document(&mut self, id: &str, target: &Path) -> Result<()> {
        check_id(id)?;
        let source = self.root.join(format!("{id}.pdf"));
        if !source.exists() {
            return Err(SyncError::Download {
                id: id.to_string(),
                reason: format!("{} not found", source.display()),
            });
        }
        if self.dry_run {
            info!(target = %target.display(), "dry run: would download");
            return Ok(());
        }
        fs::copy(&source, target)?;
        Ok(())
    }

    fn restart(&mut self) -> Result<()> {
        debug!("local store has no service to restart");
        Ok(())
    }
}
