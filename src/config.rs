//! Application configuration: TOML file loading, CLI overrides, and defaults.
//!
//! Resolution order (first found wins, values merge/override):
//! 1. CLI flags (`--shell`, `--tree`, `-v`, ...)
//! 2. `--config <file>`
//! 3. `$SHELLSIDE_CONFIG` environment variable (path to config file)
//! 4. Project-local `.shellside.toml` in the current working directory
//! 5. Global `~/.config/shellside/config.toml`
//! 6. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::backend::local::DEFAULT_IGNORE_DIRS;
use crate::fs::cwd_monitor::DEFAULT_POLL_INTERVAL_MS;
use crate::git::DEFAULT_TTL_SECS;
use crate::search::DEFAULT_DEBOUNCE_MS;
use crate::view::{ViewMode, ViewOptions};

// ── Section configs ──────────────────────────────────────────────────────────

/// General application settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GeneralConfig {
    /// Shell program to spawn.
    pub shell: Option<String>,
    /// Sidebar mode at startup.
    pub start_mode: Option<ViewMode>,
    /// Whether the sidebar is visible at startup.
    pub sidebar_open: Option<bool>,
}

/// Sidebar listing and search settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SidebarConfig {
    pub width_percent: Option<u16>,
    /// Depth limit of the recursive (tree) listing.
    pub max_depth: Option<usize>,
    /// Entry limit of the recursive listing; beyond it the tree is truncated.
    pub max_entries: Option<usize>,
    pub poll_interval_ms: Option<u64>,
    pub search_debounce_ms: Option<u64>,
    /// Directory names skipped by the recursive listing.
    pub ignore: Option<Vec<String>>,
    /// How long a git status listing is reused.
    pub git_status_ttl_secs: Option<u64>,
}

/// Log output settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. "info" or "shellside=debug".
    pub level: Option<String>,
    pub file: Option<PathBuf>,
}

// ── Top-level config ─────────────────────────────────────────────────────────

/// Top-level application configuration.
///
/// All fields are optional so that partial configs from different sources
/// can be merged together (CLI overrides file, file overrides defaults).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub sidebar: SidebarConfig,
    pub logging: LoggingConfig,
}

// ── Default constants ────────────────────────────────────────────────────────

pub const DEFAULT_WIDTH_PERCENT: u16 = 30;
pub const DEFAULT_MAX_DEPTH: usize = 10;
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;
pub const DEFAULT_LOG_LEVEL: &str = "info";

// ── Config file locator ──────────────────────────────────────────────────────

/// Return the list of candidate config file paths in priority order.
///
/// Does NOT include the CLI `--config` path; that is handled separately.
fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(env_path) = std::env::var("SHELLSIDE_CONFIG") {
        paths.push(PathBuf::from(env_path));
    }

    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join(".shellside.toml"));
    }

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("shellside").join("config.toml"));
    }

    paths
}

/// Try to read and parse a TOML config file. Returns `None` if the file
/// doesn't exist or can't be parsed (with a warning printed to stderr).
fn load_file(path: &Path) -> Option<AppConfig> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str::<AppConfig>(&content) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            eprintln!(
                "Warning: failed to parse config file {}: {}",
                path.display(),
                e
            );
            None
        }
    }
}

// ── Merge logic ──────────────────────────────────────────────────────────────

impl AppConfig {
    /// Merge `other` on top of `self`; `other`'s `Some` values win.
    pub fn merge(self, other: &AppConfig) -> AppConfig {
        AppConfig {
            general: GeneralConfig {
                shell: other.general.shell.clone().or(self.general.shell),
                start_mode: other.general.start_mode.or(self.general.start_mode),
                sidebar_open: other.general.sidebar_open.or(self.general.sidebar_open),
            },
            sidebar: SidebarConfig {
                width_percent: other.sidebar.width_percent.or(self.sidebar.width_percent),
                max_depth: other.sidebar.max_depth.or(self.sidebar.max_depth),
                max_entries: other.sidebar.max_entries.or(self.sidebar.max_entries),
                poll_interval_ms: other
                    .sidebar
                    .poll_interval_ms
                    .or(self.sidebar.poll_interval_ms),
                search_debounce_ms: other
                    .sidebar
                    .search_debounce_ms
                    .or(self.sidebar.search_debounce_ms),
                ignore: other.sidebar.ignore.clone().or(self.sidebar.ignore),
                git_status_ttl_secs: other
                    .sidebar
                    .git_status_ttl_secs
                    .or(self.sidebar.git_status_ttl_secs),
            },
            logging: LoggingConfig {
                level: other.logging.level.clone().or(self.logging.level),
                file: other.logging.file.clone().or(self.logging.file),
            },
        }
    }

    /// Load the final merged configuration.
    ///
    /// `cli_config_path` is an explicit config file path from `--config`.
    /// `cli_overrides` are partial overrides derived from CLI flags.
    pub fn load(cli_config_path: Option<&Path>, cli_overrides: Option<&AppConfig>) -> AppConfig {
        let mut config = AppConfig::default();

        // Lowest priority first so that higher ones overwrite.
        for path in candidate_paths().iter().rev() {
            if let Some(file_cfg) = load_file(path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Some(cli_path) = cli_config_path {
            if let Some(file_cfg) = load_file(cli_path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Some(overrides) = cli_overrides {
            config = config.merge(overrides);
        }

        config
    }

    // ── Convenience getters with built-in defaults ──────────────────────────

    /// Shell program: configured value, else `$SHELL`, else `/bin/sh`.
    pub fn shell(&self) -> String {
        self.general
            .shell
            .clone()
            .or_else(|| std::env::var("SHELL").ok())
            .unwrap_or_else(|| "/bin/sh".to_string())
    }

    pub fn start_mode(&self) -> ViewMode {
        self.general.start_mode.unwrap_or_default()
    }

    pub fn sidebar_open(&self) -> bool {
        self.general.sidebar_open.unwrap_or(true)
    }

    /// Sidebar width as a share of the screen, clamped to 10..=90.
    pub fn width_percent(&self) -> u16 {
        self.sidebar
            .width_percent
            .unwrap_or(DEFAULT_WIDTH_PERCENT)
            .clamp(10, 90)
    }

    pub fn max_depth(&self) -> usize {
        self.sidebar.max_depth.unwrap_or(DEFAULT_MAX_DEPTH)
    }

    pub fn max_entries(&self) -> usize {
        self.sidebar.max_entries.unwrap_or(DEFAULT_MAX_ENTRIES)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(
            self.sidebar
                .poll_interval_ms
                .unwrap_or(DEFAULT_POLL_INTERVAL_MS)
                .max(50),
        )
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.sidebar.search_debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS))
    }

    pub fn ignore(&self) -> Vec<String> {
        self.sidebar.ignore.clone().unwrap_or_else(|| {
            DEFAULT_IGNORE_DIRS.iter().map(|s| s.to_string()).collect()
        })
    }

    pub fn git_status_ttl(&self) -> Duration {
        Duration::from_secs(self.sidebar.git_status_ttl_secs.unwrap_or(DEFAULT_TTL_SECS))
    }

    pub fn log_level(&self) -> &str {
        self.logging.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    /// Log file path; defaults to `<cache_dir>/shellside/shellside.log`.
    pub fn log_file(&self) -> Option<PathBuf> {
        self.logging
            .file
            .clone()
            .or_else(|| dirs::cache_dir().map(|d| d.join("shellside").join("shellside.log")))
    }

    pub fn view_options(&self) -> ViewOptions {
        ViewOptions {
            max_depth: self.max_depth(),
            max_entries: self.max_entries(),
            debounce: self.search_debounce(),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
