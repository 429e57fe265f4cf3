//! The sidebar state machine: which listing is shown, how it is fetched,
//! and the rows derived from it.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::backend::{Backend, SessionId};
use crate::error::Result;
use crate::event::{Event, EventSender};
use crate::fs::entry::Snapshot;
use crate::fs::path::{ancestors_of, parent_of};
use crate::fs::snapshot::DirectorySnapshotSource;
use crate::fs::tree::{self, FlatItem, TreeNode};
use crate::git::{ChangeKind, GitChanges};
use crate::search::{SearchDebouncer, SearchIndex, SearchMatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Flat,
    Tree,
}

impl ViewMode {
    pub fn toggled(self) -> Self {
        match self {
            ViewMode::Flat => ViewMode::Tree,
            ViewMode::Tree => ViewMode::Flat,
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewMode::Flat => f.write_str("flat"),
            ViewMode::Tree => f.write_str("tree"),
        }
    }
}

/// Identifies one directory fetch. Only the latest generation is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestToken {
    pub generation: u64,
    pub session: SessionId,
    /// Explicit target, or `None` to resolve the session's working directory.
    pub path: Option<PathBuf>,
    pub mode: ViewMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewStatus {
    NoSession,
    Loading,
    Error(String),
    Ready,
}

impl ViewStatus {
    /// Placeholder text shown instead of rows, if any.
    pub fn label(&self) -> Option<&'static str> {
        match self {
            ViewStatus::NoSession => Some("No session"),
            ViewStatus::Loading => Some("Loading…"),
            ViewStatus::Error(_) => Some("Error loading directory"),
            ViewStatus::Ready => None,
        }
    }
}

/// Limits applied to fetches and searches.
#[derive(Debug, Clone)]
pub struct ViewOptions {
    pub max_depth: usize,
    pub max_entries: usize,
    pub debounce: Duration,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            max_depth: 10,
            max_entries: 10_000,
            debounce: Duration::from_millis(crate::search::DEFAULT_DEBOUNCE_MS),
        }
    }
}

/// Owns the sidebar's listing, tree, search and expansion state.
///
/// Fetches run as spawned tasks that answer with [`Event::SnapshotLoaded`]
/// or [`Event::GitStatusLoaded`]; the owner feeds those (and
/// [`Event::SearchDue`]) back in.
pub struct ViewCoordinator {
    backend: Arc<dyn Backend>,
    source: DirectorySnapshotSource,
    options: ViewOptions,
    tx: EventSender,

    session: Option<SessionId>,
    mode: ViewMode,
    sidebar_open: bool,
    generation: u64,
    status: ViewStatus,

    current_path: Option<PathBuf>,
    snapshot: Option<Snapshot>,
    tree: Vec<TreeNode>,
    index: Option<SearchIndex>,
    expanded: HashSet<PathBuf>,

    query: String,
    results: Option<Vec<SearchMatch>>,
    debouncer: SearchDebouncer,

    changed_only: bool,
    changes: Option<GitChanges>,

    rows: Vec<FlatItem>,
    /// Rows are narrowed by a search or the changed-only filter.
    narrowed: bool,
    cursor: usize,
}

impl ViewCoordinator {
    pub fn new(backend: Arc<dyn Backend>, mode: ViewMode, options: ViewOptions, tx: EventSender) -> Self {
        let debouncer = SearchDebouncer::new(options.debounce);
        Self {
            source: DirectorySnapshotSource::new(backend.clone()),
            backend,
            options,
            tx,
            session: None,
            mode,
            sidebar_open: false,
            generation: 0,
            status: ViewStatus::NoSession,
            current_path: None,
            snapshot: None,
            tree: Vec::new(),
            index: None,
            expanded: HashSet::new(),
            query: String::new(),
            results: None,
            debouncer,
            changed_only: false,
            changes: None,
            rows: Vec::new(),
            narrowed: false,
            cursor: 0,
        }
    }

    // -- accessors --

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn status(&self) -> &ViewStatus {
        &self.status
    }

    pub fn session(&self) -> Option<&SessionId> {
        self.session.as_ref()
    }

    pub fn is_sidebar_open(&self) -> bool {
        self.sidebar_open
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    pub fn rows(&self) -> &[FlatItem] {
        &self.rows
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn selected_row(&self) -> Option<&FlatItem> {
        self.rows.get(self.cursor)
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn results(&self) -> Option<&[SearchMatch]> {
        self.results.as_deref()
    }

    /// A search or the changed-only filter is active and left nothing to show.
    pub fn no_matches(&self) -> bool {
        self.narrowed && self.rows.is_empty()
    }

    pub fn changed_only(&self) -> bool {
        self.changed_only
    }

    /// Git status of `path`, once loaded for the changed-only filter.
    pub fn change_of(&self, path: &Path) -> Option<ChangeKind> {
        self.changes.as_ref()?.get(path).copied()
    }

    pub fn is_truncated(&self) -> bool {
        self.snapshot.as_ref().is_some_and(|s| s.truncated)
    }

    pub fn entry_count(&self) -> usize {
        self.snapshot.as_ref().map_or(0, |s| s.entries.len())
    }

    // -- lifecycle --

    /// Bind to `session` (or none). Refetches when the sidebar is open.
    pub fn set_session(&mut self, session: Option<SessionId>) {
        if self.session == session {
            return;
        }
        self.session = session;
        self.current_path = None;
        self.snapshot = None;
        self.clear_search();
        self.clear_changes();
        self.expanded.clear();
        if self.session.is_none() {
            self.generation += 1;
            self.status = ViewStatus::NoSession;
            self.tree.clear();
            self.index = None;
            self.recompute_rows();
        } else if self.sidebar_open {
            self.fetch(None);
        }
    }

    /// Show the sidebar, loading it the first time.
    pub fn open_sidebar(&mut self) {
        if self.sidebar_open {
            return;
        }
        self.sidebar_open = true;
        if self.snapshot.is_none() {
            self.fetch(None);
        }
    }

    /// Hide the sidebar, dropping expansion and search state.
    pub fn close_sidebar(&mut self) {
        if !self.sidebar_open {
            return;
        }
        self.sidebar_open = false;
        self.expanded.clear();
        self.clear_search();
        self.clear_changes();
        self.recompute_rows();
    }

    /// Switch between flat and tree and reload from the shell's directory.
    pub fn toggle_mode(&mut self) {
        self.mode = self.mode.toggled();
        tracing::info!(mode = %self.mode, "view mode switched");
        self.clear_search();
        self.clear_changes();
        self.fetch(None);
    }

    /// Reload the current listing.
    pub fn refresh(&mut self) {
        let target = self.current_path.clone();
        self.fetch(target);
    }

    pub fn on_cwd_changed(&mut self, session: &SessionId, path: PathBuf) {
        if self.session.as_ref() != Some(session) {
            tracing::debug!(%session, "cwd change for detached session ignored");
            return;
        }
        if self.current_path.as_ref() == Some(&path) {
            return;
        }
        self.change_directory(path);
    }

    /// Go one level up. No-op at the filesystem root.
    pub fn navigate_to_parent(&mut self) {
        let Some(parent) = self.current_path.as_deref().and_then(parent_of) else {
            return;
        };
        self.change_directory(parent);
    }

    /// Descend into a listed directory (flat mode).
    pub fn open_directory(&mut self, path: &Path) {
        if self.mode != ViewMode::Flat {
            return;
        }
        let is_listed_dir = self.rows.iter().any(|r| r.is_dir && r.path == path);
        if is_listed_dir {
            self.change_directory(path.to_path_buf());
        }
    }

    fn change_directory(&mut self, path: PathBuf) {
        if self.mode == ViewMode::Tree {
            self.clear_search();
            self.expanded.clear();
        }
        self.fetch(Some(path));
    }

    fn fetch(&mut self, target: Option<PathBuf>) {
        self.generation += 1;
        let Some(session) = self.session.clone() else {
            self.status = ViewStatus::NoSession;
            self.recompute_rows();
            return;
        };
        self.status = ViewStatus::Loading;
        let token = RequestToken {
            generation: self.generation,
            session: session.clone(),
            path: target.clone(),
            mode: self.mode,
        };
        tracing::debug!(generation = token.generation, mode = %token.mode, ?target, "fetching snapshot");

        let backend = self.backend.clone();
        let source = self.source.clone();
        let (max_depth, max_entries) = (self.options.max_depth, self.options.max_entries);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result: Result<Snapshot> = async {
                let path = match target {
                    Some(path) => path,
                    None => backend.working_directory(&session).await?,
                };
                match token.mode {
                    ViewMode::Flat => source.list_one_level(&path).await,
                    ViewMode::Tree => source.list_recursive(&path, max_depth, max_entries).await,
                }
            }
            .await;
            let _ = tx.send(Event::SnapshotLoaded { token, result });
        });
    }

    /// Apply a finished fetch. Returns false when the response was stale.
    pub fn on_snapshot_loaded(&mut self, token: RequestToken, result: Result<Snapshot>) -> bool {
        if token.generation != self.generation || Some(&token.session) != self.session.as_ref() {
            tracing::debug!(
                generation = token.generation,
                current = self.generation,
                "stale snapshot dropped"
            );
            return false;
        }

        match result {
            Ok(snapshot) => {
                let root_changed = self.current_path.as_ref() != Some(&snapshot.root);
                if root_changed {
                    self.expanded.clear();
                    self.cursor = 0;
                }
                if root_changed {
                    self.changes = None;
                }
                self.current_path = Some(snapshot.root.clone());
                if token.mode == ViewMode::Tree {
                    self.tree = tree::build(&snapshot.entries, &snapshot.root);
                    self.index = Some(SearchIndex::new(&tree::collect_entries(&self.tree)));
                } else {
                    self.tree.clear();
                    self.index = None;
                }
                if snapshot.truncated {
                    tracing::info!(root = %snapshot.root.display(), entries = snapshot.entries.len(), "listing truncated");
                }
                self.snapshot = Some(snapshot);
                self.status = ViewStatus::Ready;
                if !self.query.trim().is_empty() {
                    self.run_search();
                }
                if self.changed_only {
                    self.fetch_changes();
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, target = ?token.path, "directory fetch failed");
                self.status = if e.is_session() {
                    ViewStatus::NoSession
                } else {
                    ViewStatus::Error(e.to_string())
                };
                if token.path.is_some() {
                    self.current_path = token.path;
                }
                self.snapshot = None;
                self.tree.clear();
                self.index = None;
                self.results = None;
                self.changes = None;
            }
        }
        self.recompute_rows();
        true
    }

    // -- search --

    /// Update the search text; the query itself runs after the quiet period.
    pub fn set_query(&mut self, text: &str) {
        if self.mode != ViewMode::Tree {
            return;
        }
        self.query = text.to_string();
        if self.query.trim().is_empty() {
            self.debouncer.invalidate();
            self.results = None;
            self.recompute_rows();
        } else {
            self.debouncer.schedule(self.query.clone(), self.tx.clone());
        }
    }

    pub fn on_search_due(&mut self, generation: u64, query: &str) {
        if !self.debouncer.is_current(generation) || query != self.query {
            return;
        }
        self.run_search();
        self.recompute_rows();
    }

    fn run_search(&mut self) {
        let Some(index) = &self.index else {
            return;
        };
        self.results = index.query(&self.query);
        self.auto_expand();
    }

    fn clear_search(&mut self) {
        self.query.clear();
        self.results = None;
        self.debouncer.invalidate();
    }

    // -- git changes --

    /// Show only files with uncommitted changes (tree mode). Returns false
    /// when the filter does not apply to the current mode.
    pub fn toggle_changed_only(&mut self) -> bool {
        if self.mode != ViewMode::Tree {
            return false;
        }
        self.changed_only = !self.changed_only;
        tracing::info!(changed_only = self.changed_only, "changed-only filter toggled");
        if self.changed_only {
            if self.status == ViewStatus::Ready {
                self.fetch_changes();
            }
        } else {
            self.changes = None;
            self.recompute_rows();
        }
        true
    }

    fn fetch_changes(&self) {
        let Some(root) = self.current_path.clone() else {
            return;
        };
        let generation = self.generation;
        let backend = self.backend.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = backend.git_changes(&root).await;
            let _ = tx.send(Event::GitStatusLoaded { generation, result });
        });
    }

    /// Apply a finished git status query. Returns false when it was stale.
    pub fn on_git_status_loaded(&mut self, generation: u64, result: Result<GitChanges>) -> bool {
        if generation != self.generation || !self.changed_only {
            tracing::debug!(generation, current = self.generation, "stale git status dropped");
            return false;
        }
        match result {
            Ok(changes) => self.changes = Some(changes),
            Err(e) => {
                tracing::warn!(error = %e, "git status failed");
                self.changed_only = false;
                self.changes = None;
            }
        }
        self.auto_expand();
        self.recompute_rows();
        true
    }

    fn clear_changes(&mut self) {
        self.changed_only = false;
        self.changes = None;
    }

    // -- tree --

    /// Paths the tree is narrowed to: search hits, changed files, or both.
    /// `None` when neither filter is active.
    fn match_set(&self) -> Option<HashSet<PathBuf>> {
        let hits: Option<HashSet<PathBuf>> = self
            .results
            .as_ref()
            .map(|m| m.iter().map(|m| m.path.clone()).collect());
        let changed: Option<HashSet<PathBuf>> = self
            .changes
            .as_ref()
            .filter(|_| self.changed_only)
            .map(|c| c.keys().cloned().collect());
        match (hits, changed) {
            (Some(hits), Some(changed)) => Some(hits.intersection(&changed).cloned().collect()),
            (hits, changed) => hits.or(changed),
        }
    }

    /// Expand the ancestors of every match, plus matched directories.
    fn auto_expand(&mut self) {
        let (Some(root), Some(matches)) = (&self.current_path, self.match_set()) else {
            return;
        };
        if matches.is_empty() {
            return;
        }
        let mut expanded = HashSet::new();
        for path in &matches {
            expanded.extend(ancestors_of(path, root));
        }
        if let Some(hits) = &self.results {
            expanded.extend(
                hits.iter()
                    .filter(|m| m.is_dir && matches.contains(&m.path))
                    .map(|m| m.path.clone()),
            );
        }
        self.expanded = expanded;
        self.cursor = 0;
    }

    pub fn toggle_expanded(&mut self, path: &Path) {
        if self.mode != ViewMode::Tree {
            return;
        }
        let is_dir = self.rows.iter().any(|r| r.is_dir && r.path == path);
        if !is_dir {
            return;
        }
        if !self.expanded.remove(path) {
            self.expanded.insert(path.to_path_buf());
        }
        self.recompute_rows();
    }

    fn recompute_rows(&mut self) {
        self.rows = match (&self.snapshot, self.mode) {
            (None, _) => Vec::new(),
            (Some(snapshot), ViewMode::Flat) => snapshot
                .entries
                .iter()
                .enumerate()
                .map(|(i, e)| FlatItem {
                    name: e.name.clone(),
                    path: e.path.clone(),
                    is_dir: e.is_dir,
                    depth: 0,
                    is_expanded: false,
                    is_last_sibling: i + 1 == snapshot.entries.len(),
                })
                .collect(),
            (Some(snapshot), ViewMode::Tree) => match self.match_set() {
                Some(keep) if keep.is_empty() => Vec::new(),
                Some(keep) => {
                    let filtered = tree::filter(&self.tree, &keep, &snapshot.root);
                    tree::flatten(&filtered, &self.expanded)
                }
                None => tree::flatten(&self.tree, &self.expanded),
            },
        };
        self.narrowed =
            self.mode == ViewMode::Tree && self.snapshot.is_some() && self.match_set().is_some();
        if self.cursor >= self.rows.len() {
            self.cursor = self.rows.len().saturating_sub(1);
        }
    }

    // -- cursor --

    pub fn select_next(&mut self) {
        if self.cursor + 1 < self.rows.len() {
            self.cursor += 1;
        }
    }

    pub fn select_previous(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn select_first(&mut self) {
        self.cursor = 0;
    }

    pub fn select_last(&mut self) {
        self.cursor = self.rows.len().saturating_sub(1);
    }
}
