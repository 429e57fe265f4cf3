//! In-memory backend for tests.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{Backend, SessionId};
use crate::error::{AppError, Result};
use crate::fs::entry::DirectoryEntry;
use crate::git::GitChanges;

#[derive(Default)]
pub struct MockBackend {
    cwd: Mutex<HashMap<SessionId, PathBuf>>,
    dirs: Mutex<HashMap<PathBuf, Vec<DirectoryEntry>>>,
    files: Mutex<HashMap<PathBuf, String>>,
    delays: Mutex<HashMap<PathBuf, Duration>>,
    git: Mutex<GitChanges>,
    sent: Mutex<Vec<(SessionId, String)>>,
    cwd_queries: AtomicUsize,
    list_calls: AtomicUsize,
    recursive_calls: AtomicUsize,
    read_calls: AtomicUsize,
    git_calls: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_cwd(&self, session: &SessionId, path: impl Into<PathBuf>) {
        self.cwd.lock().unwrap().insert(session.clone(), path.into());
    }

    /// Register a directory (and its parent chain) as readable.
    pub fn add_dir(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        let mut dirs = self.dirs.lock().unwrap();
        Self::insert(&mut dirs, path, true);
    }

    /// Register a file with `content`.
    pub fn add_file(&self, path: impl Into<PathBuf>, content: &str) {
        let path = path.into();
        self.files
            .lock()
            .unwrap()
            .insert(path.clone(), content.to_string());
        let mut dirs = self.dirs.lock().unwrap();
        Self::insert(&mut dirs, path, false);
    }

    /// Delay every listing of `path` by `delay`.
    pub fn delay_listing(&self, path: impl Into<PathBuf>, delay: Duration) {
        self.delays.lock().unwrap().insert(path.into(), delay);
    }

    /// Report `changes` from every git status query.
    pub fn set_git_changes(&self, changes: GitChanges) {
        *self.git.lock().unwrap() = changes;
    }

    pub fn sent(&self) -> Vec<(SessionId, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn cwd_queries(&self) -> usize {
        self.cwd_queries.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn recursive_calls(&self) -> usize {
        self.recursive_calls.load(Ordering::SeqCst)
    }

    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }

    pub fn git_calls(&self) -> usize {
        self.git_calls.load(Ordering::SeqCst)
    }

    fn insert(dirs: &mut HashMap<PathBuf, Vec<DirectoryEntry>>, path: PathBuf, is_dir: bool) {
        if is_dir {
            dirs.entry(path.clone()).or_default();
        }
        if let Some(parent) = path.parent() {
            let parent = parent.to_path_buf();
            if !dirs.contains_key(&parent) {
                Self::insert(dirs, parent.clone(), true);
            }
            let siblings = dirs.entry(parent).or_default();
            if !siblings.iter().any(|e| e.path == path) {
                siblings.push(DirectoryEntry::new(path, is_dir, 1));
            }
        }
    }

    async fn maybe_delay(&self, path: &Path) {
        let delay = self.delays.lock().unwrap().get(path).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn children(&self, path: &Path) -> Result<Vec<DirectoryEntry>> {
        self.dirs
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| {
                AppError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{} not found", path.display()),
                ))
            })
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn working_directory(&self, session: &SessionId) -> Result<PathBuf> {
        self.cwd_queries.fetch_add(1, Ordering::SeqCst);
        self.cwd
            .lock()
            .unwrap()
            .get(session)
            .cloned()
            .ok_or_else(|| AppError::Session(format!("Session not found: {}", session)))
    }

    async fn list_directory(&self, path: &Path) -> Result<Vec<DirectoryEntry>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_delay(path).await;
        self.children(path)
    }

    async fn list_directory_recursive(
        &self,
        path: &Path,
        max_depth: usize,
        max_entries: usize,
    ) -> Result<Vec<DirectoryEntry>> {
        self.recursive_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_delay(path).await;
        let mut out = Vec::new();
        let mut queue = VecDeque::from([(path.to_path_buf(), 1usize)]);
        self.children(path)?;
        while let Some((dir, depth)) = queue.pop_front() {
            if depth > max_depth {
                continue;
            }
            for mut entry in self.children(&dir).unwrap_or_default() {
                if out.len() >= max_entries {
                    return Ok(out);
                }
                entry.depth = depth;
                if entry.is_dir {
                    queue.push_back((entry.path.clone(), depth + 1));
                }
                out.push(entry);
            }
        }
        Ok(out)
    }

    async fn read_file_content(&self, path: &Path) -> Result<String> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        self.files.lock().unwrap().get(path).cloned().ok_or_else(|| {
            AppError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            ))
        })
    }

    async fn git_changes(&self, path: &Path) -> Result<GitChanges> {
        self.git_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .git
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p.starts_with(path))
            .map(|(p, k)| (p.clone(), *k))
            .collect())
    }

    async fn send_input(&self, session: &SessionId, text: &str) -> Result<()> {
        if !self.cwd.lock().unwrap().contains_key(session) {
            return Err(AppError::Session(format!("Session not found: {}", session)));
        }
        self.sent
            .lock()
            .unwrap()
            .push((session.clone(), text.to_string()));
        Ok(())
    }
}
