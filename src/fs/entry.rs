use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// One entry of a directory snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryEntry {
    pub path: PathBuf,
    pub name: String,
    pub is_dir: bool,
    /// `None` only for entries produced without a known parent.
    pub parent_path: Option<PathBuf>,
    pub depth: usize,
}

impl DirectoryEntry {
    /// Build an entry for `path`, deriving `name` and `parent_path` from it.
    pub fn new(path: PathBuf, is_dir: bool, depth: usize) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        let parent_path = path.parent().map(Path::to_path_buf);
        Self {
            path,
            name,
            is_dir,
            parent_path,
            depth,
        }
    }
}

/// A complete listing fetched at one point in time.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    pub root: PathBuf,
    pub entries: Vec<DirectoryEntry>,
    /// The walk stopped at its entry limit; the listing may be incomplete.
    pub truncated: bool,
}

/// Directories first, then case-insensitive by name.
///
/// Ties fall back to the exact name and the full path so that the result
/// never depends on input order.
pub fn compare_entries(a: &DirectoryEntry, b: &DirectoryEntry) -> Ordering {
    b.is_dir
        .cmp(&a.is_dir)
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.path.cmp(&b.path))
}
