use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::analysis::{spawn_analysis, AnalysisCache, Analyzer, AnalyzeAction};
use crate::backend::{Backend, SessionId};
use crate::config::AppConfig;
use crate::event::{Event, EventSender};
use crate::fs::cwd_monitor::CwdMonitor;
use crate::selection::{format_for_handoff, FileTag, SelectionStore};
use crate::terminal::pty::PtyProcess;
use crate::terminal::TerminalPanel;
use crate::ui;
use crate::view::{ViewCoordinator, ViewMode};

/// Where key presses go.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    #[default]
    Terminal,
    Sidebar,
    Search,
    Composer,
}

/// Multi-line text input of the composer, plus the highlighted entry of
/// the selection list shown above it.
#[derive(Debug, Default)]
pub struct Composer {
    pub input: String,
    pub cursor_position: usize,
    pub selected: usize,
}

impl Composer {
    pub fn insert_char(&mut self, c: char) {
        self.input.insert(self.cursor_position, c);
        self.cursor_position += c.len_utf8();
    }

    /// Delete the character before the cursor.
    pub fn delete_char(&mut self) {
        if let Some(prev) = self.input[..self.cursor_position].chars().next_back() {
            self.cursor_position -= prev.len_utf8();
            self.input.remove(self.cursor_position);
        }
    }

    pub fn move_left(&mut self) {
        if let Some(prev) = self.input[..self.cursor_position].chars().next_back() {
            self.cursor_position -= prev.len_utf8();
        }
    }

    pub fn move_right(&mut self) {
        if let Some(next) = self.input[self.cursor_position..].chars().next() {
            self.cursor_position += next.len_utf8();
        }
    }

    pub fn home(&mut self) {
        self.cursor_position = 0;
    }

    pub fn end(&mut self) {
        self.cursor_position = self.input.len();
    }

    pub fn clear(&mut self) {
        self.input.clear();
        self.cursor_position = 0;
        self.selected = 0;
    }
}

/// Main application state.
pub struct App {
    backend: Arc<dyn Backend>,
    analyzer: Arc<dyn Analyzer>,
    tx: EventSender,

    pub view: ViewCoordinator,
    pub selection: SelectionStore,
    pub analysis: AnalysisCache,
    pub monitor: CwdMonitor,
    pub terminal: TerminalPanel,
    pub composer: Composer,

    pub focus: Focus,
    pub should_quit: bool,
    pub status_message: Option<(String, Instant)>,
    pub sidebar_width: u16,
    /// Last working directory reported by the shell.
    shell_cwd: Option<PathBuf>,
    screen: (u16, u16),
}

impl App {
    pub fn new(
        backend: Arc<dyn Backend>,
        analyzer: Arc<dyn Analyzer>,
        config: &AppConfig,
        tx: EventSender,
    ) -> Self {
        Self {
            view: ViewCoordinator::new(
                backend.clone(),
                config.start_mode(),
                config.view_options(),
                tx.clone(),
            ),
            monitor: CwdMonitor::new(backend.clone(), config.poll_interval(), tx.clone()),
            selection: SelectionStore::new(),
            analysis: AnalysisCache::new(),
            terminal: TerminalPanel::default(),
            composer: Composer::default(),
            focus: Focus::Terminal,
            should_quit: false,
            status_message: None,
            sidebar_width: config.width_percent(),
            shell_cwd: None,
            screen: (80, 24),
            backend,
            analyzer,
            tx,
        }
    }

    // ── Session ─────────────────────────────────────────────────────────────

    /// Attach a running shell and bind the sidebar to it.
    pub fn attach_shell(&mut self, session: SessionId, process: PtyProcess) {
        tracing::info!(%session, pid = ?process.pid(), "shell attached");
        self.terminal.attach(session.clone(), process);
        self.bind_session(Some(session));
        self.resize(self.screen.0, self.screen.1);
    }

    /// Point the sidebar and the cwd poller at `session`.
    pub fn bind_session(&mut self, session: Option<SessionId>) {
        self.shell_cwd = None;
        self.view.set_session(session.clone());
        self.monitor.set_session(session);
    }

    fn on_shell_exited(&mut self, session: &SessionId) {
        if self.terminal.session() != Some(session) {
            return;
        }
        tracing::info!(%session, "shell detached");
        self.terminal.detach();
        self.bind_session(None);
        self.set_status_message("Shell exited".to_string());
        if self.focus == Focus::Terminal && self.view.is_sidebar_open() {
            self.focus = Focus::Sidebar;
        }
    }

    /// The directory hand-off paths are made relative to.
    pub fn handoff_cwd(&self) -> Option<&Path> {
        self.shell_cwd.as_deref().or(self.view.current_path())
    }

    // ── Events ──────────────────────────────────────────────────────────────

    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Key(key) => crate::handler::handle_key_event(self, key),
            Event::Tick => self.clear_expired_status(),
            Event::Resize(width, height) => self.resize(width, height),
            Event::PtyOutput(bytes) => self.terminal.emulator.process(&bytes),
            Event::PtyExited(session) => self.on_shell_exited(&session),
            Event::CwdChanged { session, path } => {
                if self.view.session() == Some(&session) {
                    self.shell_cwd = Some(path.clone());
                }
                self.view.on_cwd_changed(&session, path);
            }
            Event::SnapshotLoaded { token, result } => {
                self.view.on_snapshot_loaded(token, result);
            }
            Event::GitStatusLoaded { generation, result } => {
                self.view.on_git_status_loaded(generation, result);
            }
            Event::SearchDue { generation, query } => self.view.on_search_due(generation, &query),
            Event::AnalysisDone { path, result } => {
                self.analysis.complete(&path, result);
            }
            Event::InputFailed(message) => self.set_status_message(format!("Send failed: {}", message)),
        }
    }

    /// Recompute the shell panel size for a `width` x `height` screen.
    pub fn resize(&mut self, width: u16, height: u16) {
        self.screen = (width, height);
        let (rows, cols) = ui::terminal_size(width, height, self.view.is_sidebar_open(), self.sidebar_width);
        self.terminal.resize(rows, cols);
    }

    // ── Sidebar ─────────────────────────────────────────────────────────────

    pub fn open_sidebar(&mut self) {
        self.view.open_sidebar();
        self.monitor.set_active(true);
        self.resize(self.screen.0, self.screen.1);
    }

    pub fn close_sidebar(&mut self) {
        self.view.close_sidebar();
        self.monitor.set_active(false);
        if matches!(self.focus, Focus::Sidebar | Focus::Search) {
            self.focus = Focus::Terminal;
        }
        self.resize(self.screen.0, self.screen.1);
    }

    pub fn toggle_sidebar(&mut self) {
        if self.view.is_sidebar_open() {
            self.close_sidebar();
        } else {
            self.open_sidebar();
        }
    }

    /// Swap focus between the shell and the sidebar.
    pub fn swap_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Terminal => {
                if !self.view.is_sidebar_open() {
                    self.open_sidebar();
                }
                Focus::Sidebar
            }
            _ => Focus::Terminal,
        };
    }

    fn selected_path(&self) -> Option<PathBuf> {
        self.view.selected_row().map(|row| row.path.clone())
    }

    /// Enter: descend/expand directories, analyze files.
    pub fn activate_selected(&mut self) {
        let Some(row) = self.view.selected_row().cloned() else {
            return;
        };
        if !row.is_dir {
            self.analyze_selected();
            return;
        }
        match self.view.mode() {
            ViewMode::Flat => self.view.open_directory(&row.path),
            ViewMode::Tree => self.view.toggle_expanded(&row.path),
        }
    }

    /// Analyze the highlighted file, or toggle its outline if already known.
    pub fn analyze_selected(&mut self) {
        let Some(row) = self.view.selected_row() else {
            return;
        };
        if row.is_dir {
            return;
        }
        let path = row.path.clone();
        if self.analysis.analyze(&path) == AnalyzeAction::Fetch {
            spawn_analysis(self.backend.clone(), self.analyzer.clone(), path, self.tx.clone());
        }
    }

    pub fn toggle_select(&mut self) {
        if let Some(path) = self.selected_path() {
            self.selection.toggle_select(&path);
        }
    }

    pub fn tag_selected(&mut self, tag: FileTag) {
        if let Some(path) = self.selected_path() {
            self.selection.set_state(&path, tag);
        }
    }

    pub fn remove_selected(&mut self) {
        if let Some(path) = self.selected_path() {
            self.selection.remove(&path);
        }
    }

    /// Ctrl+G: narrow the tree to files with uncommitted changes.
    pub fn toggle_changed_only(&mut self) {
        if !self.view.toggle_changed_only() {
            self.set_status_message("Changed-only filter works in tree mode".to_string());
        }
    }

    pub fn start_search(&mut self) {
        if self.view.mode() == ViewMode::Tree {
            self.focus = Focus::Search;
        }
    }

    pub fn search_input(&mut self, c: char) {
        let mut query = self.view.query().to_string();
        query.push(c);
        self.view.set_query(&query);
    }

    pub fn search_backspace(&mut self) {
        let mut query = self.view.query().to_string();
        query.pop();
        self.view.set_query(&query);
    }

    /// Leave the search line, optionally dropping the query.
    pub fn end_search(&mut self, clear: bool) {
        if clear {
            self.view.set_query("");
        }
        self.focus = Focus::Sidebar;
    }

    // ── Hand-off ────────────────────────────────────────────────────────────

    /// Type the highlighted entry's reference into the shell.
    pub fn insert_reference(&mut self) {
        let (Some(path), Some(cwd)) = (self.selected_path(), self.handoff_cwd()) else {
            return;
        };
        let mut text = format_for_handoff(&[path], cwd).join(" ");
        text.push(' ');
        self.send_to_shell(text);
    }

    pub fn open_composer(&mut self) {
        self.clamp_composer_selection();
        self.focus = Focus::Composer;
    }

    pub fn close_composer(&mut self) {
        self.focus = Focus::Terminal;
    }

    pub fn toggle_composer(&mut self) {
        if self.focus == Focus::Composer {
            self.close_composer();
        } else {
            self.open_composer();
        }
    }

    pub fn composer_select_next(&mut self) {
        if self.composer.selected + 1 < self.selection.len() {
            self.composer.selected += 1;
        }
    }

    pub fn composer_select_previous(&mut self) {
        self.composer.selected = self.composer.selected.saturating_sub(1);
    }

    fn composer_entry(&self) -> Option<PathBuf> {
        self.selection
            .get(self.composer.selected)
            .map(|(path, _)| path.to_path_buf())
    }

    /// Retag the highlighted entry of the composer's selection list.
    pub fn composer_tag(&mut self, tag: FileTag) {
        if let Some(path) = self.composer_entry() {
            self.selection.set_state(&path, tag);
        }
    }

    /// Drop the highlighted entry from the selection.
    pub fn composer_remove(&mut self) {
        if let Some(path) = self.composer_entry() {
            self.selection.remove(&path);
            self.clamp_composer_selection();
        }
    }

    pub fn composer_clear_selection(&mut self) {
        self.selection.clear_all();
        self.composer.selected = 0;
    }

    fn clamp_composer_selection(&mut self) {
        self.composer.selected = self
            .composer
            .selected
            .min(self.selection.len().saturating_sub(1));
    }

    /// Send the composed message plus Enter, then reset text and selection.
    pub fn send_composed(&mut self) {
        let Some(cwd) = self.handoff_cwd().map(Path::to_path_buf) else {
            self.set_status_message("No working directory yet".to_string());
            return;
        };
        let Some(mut message) = self.selection.compose_message(&self.composer.input, &cwd) else {
            self.set_status_message("Nothing to send".to_string());
            return;
        };
        message.push('\r');
        if self.send_to_shell(message) {
            self.composer.clear();
            self.selection.clear_all();
            self.focus = Focus::Terminal;
        }
    }

    /// Queue `text` for the bound session. False when there is none.
    fn send_to_shell(&mut self, text: String) -> bool {
        let Some(session) = self.view.session().cloned() else {
            self.set_status_message("No session".to_string());
            return false;
        };
        let backend = self.backend.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            if let Err(e) = backend.send_input(&session, &text).await {
                tracing::warn!(%session, error = %e, "send to shell failed");
                let _ = tx.send(Event::InputFailed(e.to_string()));
            }
        });
        true
    }

    /// Forward raw key bytes to the shell.
    pub fn write_to_terminal(&mut self, bytes: &[u8]) {
        if let Err(e) = self.terminal.write(bytes) {
            tracing::warn!(error = %e, "pty write failed");
        }
    }

    // ── Status ──────────────────────────────────────────────────────────────

    pub fn set_status_message(&mut self, msg: String) {
        self.status_message = Some((msg, Instant::now()));
    }

    /// Clear the status message after 3 seconds.
    pub fn clear_expired_status(&mut self) {
        if let Some((_, ref created)) = self.status_message {
            if created.elapsed().as_secs() > 3 {
                self.status_message = None;
            }
        }
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisReport, AnalysisState};
    use crate::backend::mock::MockBackend;
    use crate::view::ViewStatus;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    struct StubAnalyzer;

    impl Analyzer for StubAnalyzer {
        fn analyze(&self, _path: &Path, text: &str) -> crate::error::Result<AnalysisReport> {
            Ok(AnalysisReport {
                language: "Stub".into(),
                lines: text.lines().count(),
                symbols: Vec::new(),
            })
        }
    }

    fn setup() -> (Arc<MockBackend>, App, UnboundedReceiver<Event>) {
        let mock = Arc::new(MockBackend::new());
        mock.add_file("/proj/src/a.txt", "one\ntwo\n");
        mock.add_file("/proj/it's.txt", "");
        mock.set_cwd(&SessionId::from("s1"), "/proj");
        let (tx, rx) = mpsc::unbounded_channel();
        let app = App::new(mock.clone(), Arc::new(StubAnalyzer), &AppConfig::default(), tx);
        (mock, app, rx)
    }

    async fn next(app: &mut App, rx: &mut UnboundedReceiver<Event>) {
        let event = rx.recv().await.expect("event");
        app.handle_event(event);
    }

    async fn opened() -> (Arc<MockBackend>, App, UnboundedReceiver<Event>) {
        let (mock, mut app, mut rx) = setup();
        app.bind_session(Some(SessionId::from("s1")));
        app.open_sidebar();
        app.focus = Focus::Sidebar;
        // The listing and the first cwd observation arrive in either order.
        while app.view.status() != &ViewStatus::Ready || app.shell_cwd.is_none() {
            next(&mut app, &mut rx).await;
        }
        (mock, app, rx)
    }

    fn select(app: &mut App, name: &str) {
        app.view.select_first();
        while app.view.selected_row().map(|r| r.name.as_str()) != Some(name) {
            let before = app.view.cursor();
            app.view.select_next();
            assert_ne!(before, app.view.cursor(), "row {} not found", name);
        }
    }

    #[tokio::test]
    async fn open_sidebar_starts_polling_and_loads() {
        let (_mock, app, _rx) = opened().await;
        assert_eq!(app.shell_cwd.as_deref(), Some(Path::new("/proj")));
        let names: Vec<&str> = app.view.rows().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["src", "it's.txt"]);
    }

    #[tokio::test(start_paused = true)]
    async fn close_sidebar_stops_polling_and_returns_focus() {
        let (mock, mut app, _rx) = opened().await;
        app.close_sidebar();
        assert_eq!(app.focus, Focus::Terminal);
        let queries = mock.cwd_queries();
        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        assert_eq!(mock.cwd_queries(), queries);
    }

    #[tokio::test]
    async fn enter_on_directory_descends() {
        let (_mock, mut app, mut rx) = opened().await;
        select(&mut app, "src");
        app.activate_selected();
        next(&mut app, &mut rx).await;
        assert_eq!(app.view.current_path(), Some(Path::new("/proj/src")));
    }

    #[tokio::test]
    async fn analyze_fetches_once_then_toggles() {
        let (mock, mut app, mut rx) = opened().await;
        select(&mut app, "it's.txt");
        app.analyze_selected();
        next(&mut app, &mut rx).await;
        let entry = app.analysis.get(Path::new("/proj/it's.txt")).unwrap();
        assert!(matches!(entry.state, AnalysisState::Ready(_)));
        assert!(entry.expanded);

        app.analyze_selected();
        assert!(!app.analysis.get(Path::new("/proj/it's.txt")).unwrap().expanded);
        assert_eq!(mock.read_calls(), 1);
    }

    #[tokio::test]
    async fn insert_reference_quotes_path() {
        let (mock, mut app, _rx) = opened().await;
        select(&mut app, "it's.txt");
        app.insert_reference();
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        assert_eq!(
            mock.sent(),
            vec![(SessionId::from("s1"), "'it'\"'\"'s.txt' ".to_string())]
        );
    }

    #[tokio::test]
    async fn send_composed_clears_text_and_selection() {
        let (mock, mut app, _rx) = opened().await;
        select(&mut app, "it's.txt");
        app.toggle_select();
        app.tag_selected(FileTag::DoNotModify);
        app.open_composer();
        for c in "explain".chars() {
            app.composer.insert_char(c);
        }
        app.send_composed();
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        assert_eq!(
            mock.sent(),
            vec![(
                SessionId::from("s1"),
                "explain | Do not modify: 'it'\"'\"'s.txt'\r".to_string()
            )]
        );
        assert!(app.composer.input.is_empty());
        assert!(app.selection.is_empty());
        assert_eq!(app.focus, Focus::Terminal);
    }

    #[tokio::test]
    async fn empty_compose_sends_nothing() {
        let (mock, mut app, _rx) = opened().await;
        app.send_composed();
        tokio::task::yield_now().await;
        assert!(mock.sent().is_empty());
        assert_eq!(
            app.status_message.as_ref().map(|(m, _)| m.as_str()),
            Some("Nothing to send")
        );
    }

    #[tokio::test]
    async fn cwd_change_updates_handoff_base() {
        let (_mock, mut app, mut rx) = opened().await;
        app.handle_event(Event::CwdChanged {
            session: SessionId::from("s1"),
            path: PathBuf::from("/proj/src"),
        });
        assert_eq!(app.handoff_cwd(), Some(Path::new("/proj/src")));
        next(&mut app, &mut rx).await;
        assert_eq!(app.view.current_path(), Some(Path::new("/proj/src")));
    }

    #[tokio::test]
    async fn search_focus_only_in_tree_mode() {
        let (_mock, mut app, mut rx) = opened().await;
        app.start_search();
        assert_eq!(app.focus, Focus::Sidebar);
        app.view.toggle_mode();
        next(&mut app, &mut rx).await;
        app.start_search();
        assert_eq!(app.focus, Focus::Search);
        app.search_input('a');
        assert_eq!(app.view.query(), "a");
        app.search_backspace();
        assert_eq!(app.view.query(), "");
        app.end_search(true);
        assert_eq!(app.focus, Focus::Sidebar);
    }

    #[tokio::test]
    async fn composer_list_retags_and_removes_entries() {
        let (_mock, mut app, _rx) = opened().await;
        select(&mut app, "src");
        app.toggle_select();
        select(&mut app, "it's.txt");
        app.toggle_select();
        app.open_composer();

        app.composer_select_next();
        app.composer_select_next();
        assert_eq!(app.composer.selected, 1);
        app.composer_tag(FileTag::UseAsExample);
        assert_eq!(app.selection.tag(Path::new("/proj/it's.txt")), Some(FileTag::UseAsExample));
        assert_eq!(app.selection.tag(Path::new("/proj/src")), Some(FileTag::Modify));

        app.composer_remove();
        assert_eq!(app.selection.len(), 1);
        assert_eq!(app.composer.selected, 0);
        app.composer_select_previous();
        app.composer_tag(FileTag::DoNotModify);
        assert_eq!(app.selection.tag(Path::new("/proj/src")), Some(FileTag::DoNotModify));

        app.composer_clear_selection();
        assert!(app.selection.is_empty());
        app.composer_remove();
        assert_eq!(app.focus, Focus::Composer);
    }

    #[tokio::test]
    async fn toggle_composer_opens_and_closes() {
        let (_mock, mut app, _rx) = setup();
        app.toggle_composer();
        assert_eq!(app.focus, Focus::Composer);
        app.toggle_composer();
        assert_eq!(app.focus, Focus::Terminal);
    }

    #[tokio::test]
    async fn changed_only_in_flat_mode_explains() {
        let (mock, mut app, _rx) = opened().await;
        app.toggle_changed_only();
        assert!(!app.view.changed_only());
        assert_eq!(mock.git_calls(), 0);
        assert_eq!(
            app.status_message.as_ref().map(|(m, _)| m.as_str()),
            Some("Changed-only filter works in tree mode")
        );
    }

    #[tokio::test]
    async fn git_status_event_reaches_the_view() {
        let (mock, mut app, mut rx) = opened().await;
        mock.set_git_changes(crate::git::GitChanges::from([(
            PathBuf::from("/proj/src/a.txt"),
            crate::git::ChangeKind::Modified,
        )]));
        app.view.toggle_mode();
        while app.view.mode() != ViewMode::Tree || app.view.status() != &ViewStatus::Ready {
            next(&mut app, &mut rx).await;
        }
        app.toggle_changed_only();
        while app.view.change_of(Path::new("/proj/src/a.txt")).is_none() {
            next(&mut app, &mut rx).await;
        }
        let names: Vec<&str> = app.view.rows().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["src", "a.txt"]);
    }

    #[test]
    fn composer_editing_handles_multibyte() {
        let mut composer = Composer::default();
        for c in "héllo".chars() {
            composer.insert_char(c);
        }
        composer.move_left();
        composer.move_left();
        composer.move_left();
        composer.delete_char();
        assert_eq!(composer.input, "hllo");
        composer.home();
        composer.insert_char('>');
        composer.end();
        composer.insert_char('\n');
        assert_eq!(composer.input, ">hllo\n");
        composer.clear();
        assert_eq!(composer.cursor_position, 0);
    }

    #[test]
    fn quit_sets_flag() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut app = App::new(
            Arc::new(MockBackend::new()),
            Arc::new(StubAnalyzer),
            &AppConfig::default(),
            tx,
        );
        assert!(!app.should_quit);
        app.quit();
        assert!(app.should_quit);
    }
}
