//! Polls a session's working directory and reports changes.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::backend::{Backend, SessionId};
use crate::event::{Event, EventSender};

/// Default poll interval in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Remembers the last observed directory and the session it came from.
#[derive(Debug, Default)]
pub struct CwdTracker {
    last: Option<(SessionId, PathBuf)>,
}

impl CwdTracker {
    /// Record `path` for `session`; true when it differs from the previous
    /// observation of the same session.
    ///
    /// The first observation after a reset, or after another session was
    /// observed, always counts as a change.
    pub fn observe(&mut self, session: &SessionId, path: PathBuf) -> bool {
        if let Some((last_session, last_path)) = &self.last {
            if last_session == session && *last_path == path {
                return false;
            }
        }
        self.last = Some((session.clone(), path));
        true
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// Background poller emitting [`Event::CwdChanged`].
///
/// Polls only while active and bound to a session. Changing the session
/// forgets the previously observed directory.
pub struct CwdMonitor {
    backend: Arc<dyn Backend>,
    interval: Duration,
    tx: EventSender,
    session: Option<SessionId>,
    active: bool,
    tracker: Arc<Mutex<CwdTracker>>,
    task: Option<JoinHandle<()>>,
}

impl CwdMonitor {
    pub fn new(backend: Arc<dyn Backend>, interval: Duration, tx: EventSender) -> Self {
        Self {
            backend,
            interval,
            tx,
            session: None,
            active: false,
            tracker: Arc::new(Mutex::new(CwdTracker::default())),
            task: None,
        }
    }

    /// Bind to `session`, re-baselining when it differs from the current one.
    pub fn set_session(&mut self, session: Option<SessionId>) {
        if self.session == session {
            return;
        }
        self.stop();
        if let Ok(mut tracker) = self.tracker.lock() {
            tracker.reset();
        }
        self.session = session;
        self.restart();
    }

    /// Start or stop polling.
    pub fn set_active(&mut self, active: bool) {
        if self.active == active {
            return;
        }
        self.active = active;
        self.restart();
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    fn restart(&mut self) {
        self.stop();
        let session = match (&self.session, self.active) {
            (Some(session), true) => session.clone(),
            _ => return,
        };
        tracing::debug!(%session, interval_ms = self.interval.as_millis() as u64, "cwd polling started");

        let backend = self.backend.clone();
        let tracker = self.tracker.clone();
        let tx = self.tx.clone();
        let interval = self.interval;
        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match backend.working_directory(&session).await {
                    Ok(path) => {
                        let changed = tracker
                            .lock()
                            .map(|mut t| t.observe(&session, path.clone()))
                            .unwrap_or(false);
                        if changed {
                            tracing::debug!(%session, path = %path.display(), "cwd changed");
                            let event = Event::CwdChanged {
                                session: session.clone(),
                                path,
                            };
                            if tx.send(event).is_err() {
                                break;
                            }
                        }
                    }
                    Err(e) => tracing::debug!(%session, error = %e, "cwd poll failed"),
                }
            }
        }));
    }
}

impl Drop for CwdMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
