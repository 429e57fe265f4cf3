//! PTY process management: spawning, I/O, resize, and lifecycle.

use std::io::{Read, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use portable_pty::{native_pty_system, CommandBuilder, MasterPty, PtySize};

use crate::backend::SessionId;
use crate::error::{AppError, Result};
use crate::event::{Event, EventSender};

/// A shell running in a PTY. Clones share the same process.
#[derive(Clone)]
pub struct PtyProcess {
    /// Writer to send input to the shell.
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
    /// The master PTY handle (needed for resize).
    master: Arc<Mutex<Box<dyn MasterPty + Send>>>,
    /// Child process handle.
    child: Arc<Mutex<Box<dyn portable_pty::Child + Send + Sync>>>,
    pid: Option<u32>,
}

fn pty_error(e: impl std::fmt::Display) -> AppError {
    AppError::Terminal(e.to_string())
}

impl PtyProcess {
    /// Spawn `shell` in `cwd` and start forwarding its output as events.
    ///
    /// Output arrives as `Event::PtyOutput`; end of output is reported once
    /// as `Event::PtyExited(session)`.
    pub fn spawn(
        shell: &str,
        cwd: &Path,
        rows: u16,
        cols: u16,
        session: SessionId,
        event_tx: EventSender,
    ) -> Result<Self> {
        let pty_system = native_pty_system();

        let pair = pty_system
            .openpty(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(pty_error)?;

        let mut cmd = CommandBuilder::new(shell);
        cmd.cwd(cwd);

        let child = pair.slave.spawn_command(cmd).map_err(pty_error)?;
        let pid = child.process_id();

        let writer = pair.master.take_writer().map_err(pty_error)?;
        let mut reader = pair.master.try_clone_reader().map_err(pty_error)?;
        let master: Box<dyn MasterPty + Send> = pair.master;

        tokio::task::spawn_blocking(move || {
            let mut buf = [0u8; 8192];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if event_tx.send(Event::PtyOutput(buf[..n].to_vec())).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "pty read ended");
                        break;
                    }
                }
            }
            let _ = event_tx.send(Event::PtyExited(session));
        });

        Ok(Self {
            writer: Arc::new(Mutex::new(writer)),
            master: Arc::new(Mutex::new(master)),
            child: Arc::new(Mutex::new(child)),
            pid,
        })
    }

    /// OS process id of the shell, when the platform reports one.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Write raw bytes to the PTY stdin.
    pub fn write(&self, data: &[u8]) -> std::io::Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        writer.write_all(data)?;
        writer.flush()
    }

    /// Resize the PTY to new dimensions.
    pub fn resize(&self, rows: u16, cols: u16) -> std::io::Result<()> {
        let master = self
            .master
            .lock()
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| std::io::Error::other(e.to_string()))
    }

    /// Shut down the PTY process: kill + wait.
    pub fn shutdown(&self) {
        if let Ok(mut child) = self.child.lock() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl std::fmt::Debug for PtyProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtyProcess").field("pid", &self.pid).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tokio::sync::mpsc;

    fn is_alive(pty: &PtyProcess) -> bool {
        matches!(pty.child.lock().unwrap().try_wait(), Ok(None))
    }

    #[tokio::test]
    async fn spawn_write_and_shutdown() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let pty = PtyProcess::spawn("/bin/sh", &env::temp_dir(), 24, 80, SessionId::new(), tx)
            .expect("PTY should spawn");
        assert!(is_alive(&pty));
        assert!(pty.pid().is_some());
        assert!(pty.write(b"echo hello\n").is_ok());
        assert!(pty.resize(40, 120).is_ok());
        pty.shutdown();
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert!(!is_alive(&pty));
    }

    #[tokio::test]
    async fn exit_is_reported_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = SessionId::new();
        let pty = PtyProcess::spawn("/bin/sh", &env::temp_dir(), 24, 80, session.clone(), tx)
            .expect("PTY should spawn");
        pty.write(b"exit\n").expect("write");
        let exited = tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while let Some(event) = rx.recv().await {
                if let Event::PtyExited(id) = event {
                    return Some(id);
                }
            }
            None
        })
        .await
        .expect("shell should exit");
        assert_eq!(exited, Some(session));
    }
}
