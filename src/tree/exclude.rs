//! Exclude patterns matched against reconstructed node paths.

use crate::error::{Result, SyncError};
use regex::Regex;

/// Regular expressions anchored at the start of the path.
#[derive(Debug, Clone, Default)]
pub struct ExcludePatterns {
    patterns: Vec<Regex>,
}

impl ExcludePatterns {
    pub fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                let p = p.as_ref();
                Regex::new(&format!("^(?:{})", p)).map_err(|source| SyncError::InvalidPattern {
                    pattern: p.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn matches(&self, path: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(path))
    }
}
