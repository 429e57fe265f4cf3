use std::path::Path;
use std::sync::Arc;

use crate::backend::Backend;
use crate::error::Result;
use crate::fs::entry::{compare_entries, Snapshot};

/// Fetches directory listings from a [`Backend`] and normalizes them.
#[derive(Clone)]
pub struct DirectorySnapshotSource {
    backend: Arc<dyn Backend>,
}

impl DirectorySnapshotSource {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Entries directly inside `path`, sorted directories first.
    ///
    /// Every entry is re-parented onto `path` at depth 1 so that callers
    /// never need to re-derive structure.
    pub async fn list_one_level(&self, path: &Path) -> Result<Snapshot> {
        let mut entries = self.backend.list_directory(path).await?;
        for entry in &mut entries {
            entry.parent_path = Some(path.to_path_buf());
            entry.depth = 1;
        }
        entries.sort_by(compare_entries);
        Ok(Snapshot {
            root: path.to_path_buf(),
            entries,
            truncated: false,
        })
    }

    /// The subtree below `path`, bounded by `max_depth` and `max_entries`.
    ///
    /// `truncated` is set when the entry limit was reached; the listing may
    /// then be incomplete.
    pub async fn list_recursive(
        &self,
        path: &Path,
        max_depth: usize,
        max_entries: usize,
    ) -> Result<Snapshot> {
        let mut entries = self
            .backend
            .list_directory_recursive(path, max_depth, max_entries)
            .await?;
        entries.retain(|e| e.path != path);
        let truncated = max_entries > 0 && entries.len() >= max_entries;
        Ok(Snapshot {
            root: path.to_path_buf(),
            entries,
            truncated,
        })
    }
}
