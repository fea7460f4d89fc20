//! Persisted set of canonical hook texts that have already been used.
//!
//! The set only grows. It is loaded at the start of every generation request
//! and extended after a request succeeds.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::StorageResult;
use crate::fs_utils::{read_json_optional, write_json_atomic};

/// JSON-array file holding canonicalized hook texts.
#[derive(Debug, Clone)]
pub struct HookHistory {
    path: PathBuf,
}

impl HookHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the set; a missing file is an empty history.
    pub async fn load(&self) -> StorageResult<BTreeSet<String>> {
        let entries: Option<Vec<String>> = read_json_optional(&self.path).await?;
        Ok(entries.unwrap_or_default().into_iter().collect())
    }

    /// Add `canonical` entries and write the whole set back.
    ///
    /// Returns how many entries were new.
    pub async fn extend<I>(&self, canonical: I) -> StorageResult<usize>
    where
        I: IntoIterator<Item = String>,
    {
        let mut set = self.load().await?;
        let before = set.len();
        set.extend(canonical);
        let added = set.len() - before;

        let entries: Vec<&String> = set.iter().collect();
        write_json_atomic(&self.path, &entries).await?;
        debug!(path = %self.path.display(), added, total = set.len(), "Saved hook history");
        Ok(added)
    }
}
