//! Backend over the local filesystem and the PTY sessions of this process.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use walkdir::WalkDir;

use super::{Backend, SessionId};
use crate::error::{AppError, Result};
use crate::fs::entry::DirectoryEntry;
use crate::git::{self, GitChanges, GitStatusCache};
use crate::terminal::pty::PtyProcess;

/// Directory names skipped by the recursive walk unless configured otherwise.
pub const DEFAULT_IGNORE_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "target",
    "dist",
    "build",
    ".cache",
    ".next",
    ".nuxt",
    "__pycache__",
    ".venv",
    "venv",
];

/// Local filesystem plus the shells registered with [`LocalBackend::register`].
pub struct LocalBackend {
    sessions: RwLock<HashMap<SessionId, PtyProcess>>,
    ignore: HashSet<String>,
    git_cache: GitStatusCache,
}

impl LocalBackend {
    pub fn new(ignore: Vec<String>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ignore: ignore.into_iter().collect(),
            git_cache: GitStatusCache::default(),
        }
    }

    /// Reuse git status listings for `ttl`.
    pub fn with_git_ttl(mut self, ttl: Duration) -> Self {
        self.git_cache = GitStatusCache::new(ttl);
        self
    }

    /// Make `process` reachable under `session`.
    pub fn register(&self, session: SessionId, process: PtyProcess) {
        if let Ok(mut sessions) = self.sessions.write() {
            sessions.insert(session, process);
        }
    }

    /// Forget `session`, returning its process if it was known.
    pub fn unregister(&self, session: &SessionId) -> Option<PtyProcess> {
        self.sessions
            .write()
            .ok()
            .and_then(|mut sessions| sessions.remove(session))
    }

    fn process(&self, session: &SessionId) -> Result<PtyProcess> {
        let sessions = self
            .sessions
            .read()
            .map_err(|e| AppError::Session(e.to_string()))?;
        sessions
            .get(session)
            .cloned()
            .ok_or_else(|| AppError::Session(format!("Session not found: {}", session)))
    }
}

/// Run blocking filesystem work off the async workers.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Io(std::io::Error::other(e.to_string())))?
}

/// Read the entries directly inside `dir`.
///
/// Entries that vanish or cannot be inspected while reading are skipped.
/// Symlinks report the type of their target when it resolves.
pub fn read_one_level(dir: &Path) -> Result<Vec<DirectoryEntry>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };
        let path = entry.path();
        let is_dir = match fs::metadata(&path) {
            Ok(meta) => meta.is_dir(),
            Err(_) => match entry.file_type() {
                Ok(ft) => ft.is_dir(),
                Err(_) => continue,
            },
        };
        entries.push(DirectoryEntry::new(path, is_dir, 1));
    }
    Ok(entries)
}

/// Walk `root` up to `max_depth` levels, stopping after `max_entries`.
///
/// Symlinks are skipped and directories named in `ignore` are pruned.
pub fn walk_recursive(
    root: &Path,
    max_depth: usize,
    max_entries: usize,
    ignore: &HashSet<String>,
) -> Result<Vec<DirectoryEntry>> {
    // Surface an unreadable root as an error rather than an empty walk.
    fs::read_dir(root)?;

    let mut entries = Vec::new();
    let walker = WalkDir::new(root)
        .max_depth(max_depth)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 || !e.file_type().is_dir() {
                return true;
            }
            !ignore.contains(e.file_name().to_string_lossy().as_ref())
        });

    for entry in walker {
        if entries.len() >= max_entries {
            tracing::debug!(root = %root.display(), max_entries, "recursive listing truncated");
            break;
        }
        match entry {
            Ok(e) => {
                if e.depth() == 0 || e.path_is_symlink() {
                    continue;
                }
                let path = e.path().to_path_buf();
                let parent = path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| root.to_path_buf());
                let mut item = DirectoryEntry::new(path, e.file_type().is_dir(), e.depth());
                item.parent_path = Some(parent);
                entries.push(item);
            }
            Err(err) => {
                tracing::debug!(error = %err, "skipping unreadable entry");
            }
        }
    }
    Ok(entries)
}

#[async_trait]
impl Backend for LocalBackend {
    async fn working_directory(&self, session: &SessionId) -> Result<PathBuf> {
        let process = self.process(session)?;
        let pid = process
            .pid()
            .ok_or_else(|| AppError::Session(format!("No process id for session {}", session)))?;

        #[cfg(target_os = "linux")]
        {
            tokio::fs::read_link(format!("/proc/{}/cwd", pid))
                .await
                .map_err(|e| AppError::Session(format!("Failed to read cwd of {}: {}", pid, e)))
        }

        #[cfg(not(target_os = "linux"))]
        {
            Err(AppError::Session(format!(
                "Reading the working directory of {} is only supported on Linux",
                pid
            )))
        }
    }

    async fn list_directory(&self, path: &Path) -> Result<Vec<DirectoryEntry>> {
        let path = path.to_path_buf();
        blocking(move || read_one_level(&path)).await
    }

    async fn list_directory_recursive(
        &self,
        path: &Path,
        max_depth: usize,
        max_entries: usize,
    ) -> Result<Vec<DirectoryEntry>> {
        let path = path.to_path_buf();
        let ignore = self.ignore.clone();
        blocking(move || walk_recursive(&path, max_depth, max_entries, &ignore)).await
    }

    async fn read_file_content(&self, path: &Path) -> Result<String> {
        Ok(tokio::fs::read_to_string(path).await?)
    }

    async fn git_changes(&self, path: &Path) -> Result<GitChanges> {
        git::read_changes(path, &self.git_cache).await
    }

    async fn send_input(&self, session: &SessionId, text: &str) -> Result<()> {
        let process = self.process(session)?;
        process.write(text.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    fn setup_test_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("alpha")).unwrap();
        fs::create_dir(dir.path().join("alpha").join("nested")).unwrap();
        fs::create_dir(dir.path().join("node_modules")).unwrap();
        File::create(dir.path().join("node_modules").join("pkg.js")).unwrap();
        File::create(dir.path().join("alpha").join("inner.txt")).unwrap();
        File::create(dir.path().join("alpha").join("nested").join("deep.txt")).unwrap();
        File::create(dir.path().join("file_a.txt")).unwrap();
        dir
    }

    fn default_ignore() -> HashSet<String> {
        DEFAULT_IGNORE_DIRS.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn one_level_lists_direct_children() {
        let dir = setup_test_dir();
        let mut names: Vec<String> = read_one_level(dir.path())
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["alpha", "file_a.txt", "node_modules"]);
    }

    #[test]
    fn one_level_reports_parent_and_depth() {
        let dir = setup_test_dir();
        for entry in read_one_level(dir.path()).unwrap() {
            assert_eq!(entry.parent_path.as_deref(), Some(dir.path()));
            assert_eq!(entry.depth, 1);
        }
    }

    #[test]
    fn one_level_empty_directory_is_empty_not_error() {
        let dir = TempDir::new().unwrap();
        assert!(read_one_level(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn one_level_unreadable_path_is_io_error() {
        let err = read_one_level(Path::new("/nonexistent/shellside")).unwrap_err();
        assert!(matches!(err, AppError::Io(_)));
    }

    #[test]
    fn recursive_walk_prunes_ignored_dirs() {
        let dir = setup_test_dir();
        let entries = walk_recursive(dir.path(), 10, 1000, &default_ignore()).unwrap();
        assert!(entries.iter().all(|e| e.name != "node_modules" && e.name != "pkg.js"));
        assert!(entries.iter().any(|e| e.name == "deep.txt"));
    }

    #[test]
    fn recursive_walk_reports_consistent_parents() {
        let dir = setup_test_dir();
        let entries = walk_recursive(dir.path(), 10, 1000, &default_ignore()).unwrap();
        let deep = entries.iter().find(|e| e.name == "deep.txt").unwrap();
        assert_eq!(deep.depth, 3);
        assert_eq!(
            deep.parent_path.as_deref(),
            Some(dir.path().join("alpha").join("nested").as_path())
        );
    }

    #[test]
    fn recursive_walk_respects_depth() {
        let dir = setup_test_dir();
        let entries = walk_recursive(dir.path(), 1, 1000, &default_ignore()).unwrap();
        assert!(entries.iter().all(|e| e.depth == 1));
    }

    #[test]
    fn recursive_walk_truncates_at_limit() {
        let dir = setup_test_dir();
        let entries = walk_recursive(dir.path(), 10, 2, &default_ignore()).unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn recursive_walk_unreadable_root_is_error() {
        assert!(walk_recursive(Path::new("/nonexistent/shellside"), 10, 10, &default_ignore()).is_err());
    }

    #[tokio::test]
    async fn unknown_session_is_session_error() {
        let backend = LocalBackend::new(Vec::new());
        let err = backend
            .working_directory(&SessionId::from("missing"))
            .await
            .unwrap_err();
        assert!(err.is_session());
        let err = backend
            .send_input(&SessionId::from("missing"), "ls")
            .await
            .unwrap_err();
        assert!(err.is_session());
    }

    #[tokio::test]
    async fn git_changes_outside_repository_are_empty() {
        let dir = TempDir::new().unwrap();
        let backend = LocalBackend::new(Vec::new()).with_git_ttl(Duration::from_secs(1));
        assert!(backend.git_changes(dir.path()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn read_file_content_roundtrips_text() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("note.txt");
        fs::write(&path, "hello").unwrap();
        let backend = LocalBackend::new(Vec::new());
        assert_eq!(backend.read_file_content(&path).await.unwrap(), "hello");
        assert!(backend
            .read_file_content(&dir.path().join("missing.txt"))
            .await
            .is_err());
    }
}
