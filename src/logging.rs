//! `tracing` setup. The interactive UI owns the terminal, so it logs to a
//! file; headless runs log to stderr.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Environment variable overriding the configured filter.
pub const LOG_ENV: &str = "SHELLSIDE_LOG";

/// Filter directive for `-v` repetitions on top of the configured level.
pub fn directive(configured: &str, verbose: u8) -> String {
    match verbose {
        0 => configured.to_string(),
        1 => "shellside=debug,info".to_string(),
        _ => "shellside=trace,debug".to_string(),
    }
}

fn filter(directive: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(directive))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Log to `file`, creating its directory. Falls back to discarding logs
/// when the file cannot be opened, since stderr belongs to the UI.
pub fn init_file(directive: &str, file: Option<&Path>) -> Option<PathBuf> {
    let path = file?;
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).ok()?;
    }
    let handle = OpenOptions::new().create(true).append(true).open(path).ok()?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(Mutex::new(handle))
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(filter(directive))
        .with(file_layer)
        .try_init()
        .ok()?;

    tracing::info!(path = ?path, "tracing initialized");
    Some(path.to_path_buf())
}

/// Log to stderr (headless mode).
pub fn init_stderr(directive: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(directive))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
