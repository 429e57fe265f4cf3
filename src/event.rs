use std::path::PathBuf;
use std::time::Duration;

use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use tokio::sync::mpsc;

use crate::analysis::AnalysisReport;
use crate::backend::SessionId;
use crate::error::Result;
use crate::fs::entry::Snapshot;
use crate::git::GitChanges;
use crate::view::RequestToken;

/// Application events.
#[derive(Debug)]
pub enum Event {
    /// A key press event.
    Key(KeyEvent),
    /// A periodic tick for rendering.
    Tick,
    /// Terminal resize event.
    Resize(u16, u16),
    /// Raw output bytes from the shell.
    PtyOutput(Vec<u8>),
    /// The shell behind a session exited.
    PtyExited(SessionId),
    /// The shell's working directory differs from the last observed value.
    CwdChanged { session: SessionId, path: PathBuf },
    /// A directory fetch finished (successfully or not).
    SnapshotLoaded {
        token: RequestToken,
        result: Result<Snapshot>,
    },
    /// A git status query for the tree view finished.
    GitStatusLoaded {
        generation: u64,
        result: Result<GitChanges>,
    },
    /// The search input has been quiet long enough to run `query`.
    SearchDue { generation: u64, query: String },
    /// A file analysis finished.
    AnalysisDone {
        path: PathBuf,
        result: Result<AnalysisReport>,
    },
    /// Writing to the shell failed.
    InputFailed(String),
}

/// Sender half used by background tasks.
pub type EventSender = mpsc::UnboundedSender<Event>;

/// Async event handler that polls crossterm events and forwards them via a channel.
pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<Event>,
    tx: EventSender,
}

impl EventHandler {
    /// Create a new EventHandler with the given tick rate.
    pub fn new(tick_rate: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let event_tx = tx.clone();

        tokio::task::spawn_blocking(move || loop {
            if event::poll(tick_rate).unwrap_or(false) {
                let forwarded = match event::read() {
                    Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => {
                        event_tx.send(Event::Key(key))
                    }
                    Ok(CrosstermEvent::Resize(w, h)) => event_tx.send(Event::Resize(w, h)),
                    _ => Ok(()),
                };
                if forwarded.is_err() {
                    break;
                }
            } else if event_tx.send(Event::Tick).is_err() {
                break;
            }
        });

        Self { rx, tx }
    }

    /// Get a sender clone for async tasks.
    pub fn sender(&self) -> EventSender {
        self.tx.clone()
    }

    /// Receive the next event (blocks until available).
    pub async fn next(&mut self) -> Result<Event> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| crate::error::AppError::Terminal("Event channel closed".into()))
    }
}
