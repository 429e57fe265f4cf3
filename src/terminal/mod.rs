//! Embedded terminal panel: PTY process, screen emulation and session binding.

pub mod emulator;
pub mod pty;

use crate::backend::SessionId;

/// State of the shell panel.
pub struct TerminalPanel {
    pub emulator: emulator::TerminalEmulator,
    /// Attached shell and the session it is registered under.
    attached: Option<(SessionId, pty::PtyProcess)>,
}

impl Default for TerminalPanel {
    fn default() -> Self {
        Self {
            emulator: emulator::TerminalEmulator::new(24, 80),
            attached: None,
        }
    }
}

impl std::fmt::Debug for TerminalPanel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalPanel")
            .field("emulator", &self.emulator)
            .field("session", &self.session())
            .finish()
    }
}

impl TerminalPanel {
    pub fn attach(&mut self, session: SessionId, process: pty::PtyProcess) {
        self.attached = Some((session, process));
    }

    /// Drop the shell binding, returning the session it had.
    pub fn detach(&mut self) -> Option<SessionId> {
        self.attached.take().map(|(session, _)| session)
    }

    pub fn session(&self) -> Option<&SessionId> {
        self.attached.as_ref().map(|(session, _)| session)
    }

    pub fn is_attached(&self) -> bool {
        self.attached.is_some()
    }

    /// Forward raw key bytes to the shell.
    pub fn write(&self, data: &[u8]) -> std::io::Result<()> {
        match &self.attached {
            Some((_, process)) => process.write(data),
            None => Ok(()),
        }
    }

    /// Resize the screen and the PTY behind it.
    pub fn resize(&mut self, rows: u16, cols: u16) {
        self.emulator.resize(rows as usize, cols as usize);
        if let Some((_, process)) = &self.attached {
            if let Err(e) = process.resize(rows, cols) {
                tracing::warn!(error = %e, "pty resize failed");
            }
        }
    }

    pub fn shutdown(&mut self) {
        if let Some((session, process)) = self.attached.take() {
            tracing::info!(%session, "shutting down shell");
            process.shutdown();
        }
    }
}
