//! Per-file git change status, cached per directory for a short time.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::Instant;

use crate::error::Result;

/// Seconds a status listing stays valid.
pub const DEFAULT_TTL_SECS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Modified,
    Added,
    Deleted,
    Renamed,
    Untracked,
    Conflicted,
}

impl ChangeKind {
    /// Parse the two-letter `XY` code of a porcelain v1 record.
    fn from_code(x: char, y: char) -> Option<Self> {
        let kind = match (x, y) {
            ('!', '!') => return None,
            ('?', '?') => ChangeKind::Untracked,
            ('U', _) | (_, 'U') | ('A', 'A') | ('D', 'D') => ChangeKind::Conflicted,
            ('R', _) | (_, 'R') => ChangeKind::Renamed,
            ('A', _) | (_, 'A') => ChangeKind::Added,
            ('D', _) | (_, 'D') => ChangeKind::Deleted,
            (' ', ' ') => return None,
            _ => ChangeKind::Modified,
        };
        Some(kind)
    }

    pub fn marker(self) -> char {
        match self {
            ChangeKind::Modified => 'M',
            ChangeKind::Added => 'A',
            ChangeKind::Deleted => 'D',
            ChangeKind::Renamed => 'R',
            ChangeKind::Untracked => '?',
            ChangeKind::Conflicted => 'U',
        }
    }
}

/// Changed files by absolute path.
pub type GitChanges = HashMap<PathBuf, ChangeKind>;

/// Parse `git status --porcelain=v1 -z` output. Paths are joined onto `repo_root`.
pub fn parse_porcelain(repo_root: &Path, output: &str) -> GitChanges {
    let mut changes = GitChanges::new();
    let mut records = output.split('\0');
    while let Some(record) = records.next() {
        let mut chars = record.chars();
        let (Some(x), Some(y), Some(' ')) = (chars.next(), chars.next(), chars.next()) else {
            continue;
        };
        // Renames and copies carry the source path as the next record.
        if matches!(x, 'R' | 'C') {
            records.next();
        }
        let Some(kind) = ChangeKind::from_code(x, y) else {
            continue;
        };
        let path = chars.as_str().trim_end_matches('/');
        if !path.is_empty() {
            changes.insert(repo_root.join(path), kind);
        }
    }
    changes
}

/// Status listings by the directory they were requested for.
///
/// Entries expire after `ttl`; nothing else invalidates them.
pub struct GitStatusCache {
    ttl: Duration,
    entries: Mutex<HashMap<PathBuf, (Instant, GitChanges)>>,
}

impl GitStatusCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, dir: &Path) -> Option<GitChanges> {
        let entries = self.entries.lock().ok()?;
        let (stored, changes) = entries.get(dir)?;
        (stored.elapsed() <= self.ttl).then(|| changes.clone())
    }

    pub fn insert(&self, dir: PathBuf, changes: GitChanges) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.retain(|_, (stored, _)| stored.elapsed() <= self.ttl);
            entries.insert(dir, (Instant::now(), changes));
        }
    }
}

impl Default for GitStatusCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_TTL_SECS))
    }
}

/// Working-tree changes of the repository containing `dir`.
///
/// A directory outside any repository, or a missing `git` binary, yields
/// no changes rather than an error.
pub async fn read_changes(dir: &Path, cache: &GitStatusCache) -> Result<GitChanges> {
    if let Some(hit) = cache.get(dir) {
        return Ok(hit);
    }
    let Some(repo_root) = toplevel(dir).await else {
        cache.insert(dir.to_path_buf(), GitChanges::new());
        return Ok(GitChanges::new());
    };
    let output = Command::new("git")
        .arg("-C")
        .arg(&repo_root)
        .args(["status", "--porcelain=v1", "-z", "--untracked-files=all"])
        .output()
        .await?;
    let changes = if output.status.success() {
        parse_porcelain(&repo_root, &String::from_utf8_lossy(&output.stdout))
    } else {
        tracing::debug!(
            dir = %dir.display(),
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "git status failed"
        );
        GitChanges::new()
    };
    tracing::debug!(repo = %repo_root.display(), changed = changes.len(), "git status read");
    cache.insert(dir.to_path_buf(), changes.clone());
    Ok(changes)
}

async fn toplevel(dir: &Path) -> Option<PathBuf> {
    let output = match Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(["rev-parse", "--show-toplevel"])
        .output()
        .await
    {
        Ok(output) => output,
        Err(e) => {
            tracing::debug!(error = %e, "git unavailable");
            return None;
        }
    };
    if !output.status.success() {
        return None;
    }
    let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!root.is_empty()).then(|| PathBuf::from(root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command as StdCommand;
    use tempfile::TempDir;

    #[test]
    fn parses_porcelain_records() {
        let output = " M src/main.rs\0A  new.rs\0?? notes/todo.txt\0R  renamed.rs\0old.rs\0UU both.rs\0 D gone.rs\0";
        let changes = parse_porcelain(Path::new("/repo"), output);
        assert_eq!(changes.len(), 6);
        assert_eq!(changes[Path::new("/repo/src/main.rs")], ChangeKind::Modified);
        assert_eq!(changes[Path::new("/repo/new.rs")], ChangeKind::Added);
        assert_eq!(changes[Path::new("/repo/notes/todo.txt")], ChangeKind::Untracked);
        assert_eq!(changes[Path::new("/repo/renamed.rs")], ChangeKind::Renamed);
        assert_eq!(changes[Path::new("/repo/both.rs")], ChangeKind::Conflicted);
        assert_eq!(changes[Path::new("/repo/gone.rs")], ChangeKind::Deleted);
        assert!(!changes.contains_key(Path::new("/repo/old.rs")));
    }

    #[test]
    fn ignores_ignored_and_malformed_records() {
        let changes = parse_porcelain(Path::new("/repo"), "!! target/\0x\0\0?? dir/\0");
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[Path::new("/repo/dir")], ChangeKind::Untracked);
    }

    #[tokio::test(start_paused = true)]
    async fn cache_entries_expire() {
        let cache = GitStatusCache::new(Duration::from_secs(5));
        let mut changes = GitChanges::new();
        changes.insert(PathBuf::from("/r/a.rs"), ChangeKind::Modified);
        cache.insert(PathBuf::from("/r"), changes.clone());

        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(cache.get(Path::new("/r")), Some(changes));
        assert_eq!(cache.get(Path::new("/elsewhere")), None);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get(Path::new("/r")), None);
    }

    #[tokio::test]
    async fn outside_a_repository_has_no_changes() {
        let dir = TempDir::new().unwrap();
        let changes = read_changes(dir.path(), &GitStatusCache::default()).await.unwrap();
        assert!(changes.is_empty());
    }

    #[tokio::test]
    async fn reads_changes_of_a_repository() {
        let dir = TempDir::new().unwrap();
        let initialized = StdCommand::new("git")
            .arg("init")
            .arg("-q")
            .current_dir(dir.path())
            .status()
            .is_ok_and(|s| s.success());
        if !initialized {
            // No git binary in this environment.
            return;
        }
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src").join("lib.rs"), "fn a() {}\n").unwrap();

        let root = dir.path().canonicalize().unwrap();
        let changes = read_changes(&root, &GitStatusCache::default()).await.unwrap();
        assert_eq!(changes.get(&root.join("src").join("lib.rs")), Some(&ChangeKind::Untracked));
    }
}
