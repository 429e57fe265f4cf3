//! The capability the sidebar consumes: session working directories,
//! directory listings, file contents, git status and shell input.

pub mod local;
#[cfg(test)]
pub mod mock;

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::Result;
use crate::fs::entry::DirectoryEntry;
use crate::git::GitChanges;

/// Identifier of one terminal session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Allocate a fresh random session id.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// First eight characters, for compact display.
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Backend operations used by the sidebar.
///
/// Every method may suspend. Implementations report unknown sessions as
/// `AppError::Session` and unreadable paths as `AppError::Io`.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Current working directory of the process behind `session`.
    async fn working_directory(&self, session: &SessionId) -> Result<PathBuf>;

    /// Entries directly inside `path`.
    async fn list_directory(&self, path: &Path) -> Result<Vec<DirectoryEntry>>;

    /// Entries below `path`, at most `max_depth` levels deep.
    ///
    /// Stops silently once `max_entries` entries have been collected.
    async fn list_directory_recursive(
        &self,
        path: &Path,
        max_depth: usize,
        max_entries: usize,
    ) -> Result<Vec<DirectoryEntry>>;

    /// Full text of the file at `path`.
    async fn read_file_content(&self, path: &Path) -> Result<String>;

    /// Changed files of the git repository containing `path`; empty outside
    /// a repository.
    async fn git_changes(&self, path: &Path) -> Result<GitChanges>;

    /// Write `text` to the input of `session`.
    async fn send_input(&self, session: &SessionId, text: &str) -> Result<()>;
}
