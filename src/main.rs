mod analysis;
mod app;
mod backend;
mod components;
mod config;
mod error;
mod event;
mod fs;
mod git;
mod handler;
mod logging;
mod search;
mod selection;
mod terminal;
mod theme;
mod tui;
mod ui;
mod view;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use crate::analysis::SyntaxOutlineAnalyzer;
use crate::app::App;
use crate::backend::local::LocalBackend;
use crate::backend::{Backend, SessionId};
use crate::config::{AppConfig, GeneralConfig};
use crate::event::{Event, EventHandler};
use crate::fs::snapshot::DirectorySnapshotSource;
use crate::terminal::pty::PtyProcess;
use crate::tui::{install_panic_hook, Tui};
use crate::view::ViewMode;

/// A shell with a file sidebar that follows its working directory.
#[derive(Parser, Debug)]
#[command(name = "shellside", version, about)]
struct Cli {
    /// Directory the shell starts in (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Path to a config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the listing of PATH as JSON and exit
    #[arg(long)]
    print: bool,

    /// Start in tree mode (with --print: print the whole subtree)
    #[arg(long)]
    tree: bool,

    /// Shell program to run
    #[arg(long)]
    shell: Option<String>,

    /// Start with the sidebar hidden
    #[arg(long)]
    no_sidebar: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn overrides(&self) -> AppConfig {
        AppConfig {
            general: GeneralConfig {
                shell: self.shell.clone(),
                start_mode: self.tree.then_some(ViewMode::Tree),
                sidebar_open: self.no_sidebar.then_some(false),
            },
            ..AppConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> error::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref(), Some(&cli.overrides()));
    let directive = logging::directive(config.log_level(), cli.verbose);

    let path = cli.path.canonicalize().map_err(|_| {
        error::AppError::InvalidPath(format!("{} does not exist", cli.path.display()))
    })?;

    if cli.print {
        logging::init_stderr(&directive);
        return print_listing(&path, cli.tree, &config).await;
    }

    logging::init_file(&directive, config.log_file().as_deref());
    run(&path, &config).await
}

/// Headless mode: one listing of `path` as JSON on stdout.
async fn print_listing(path: &Path, tree: bool, config: &AppConfig) -> error::Result<()> {
    let backend: Arc<dyn Backend> = Arc::new(LocalBackend::new(config.ignore()));
    let source = DirectorySnapshotSource::new(backend);
    let json = if tree {
        let snapshot = source
            .list_recursive(path, config.max_depth(), config.max_entries())
            .await?;
        if snapshot.truncated {
            tracing::warn!(limit = config.max_entries(), "listing truncated");
        }
        serde_json::to_string_pretty(&fs::tree::build(&snapshot.entries, &snapshot.root))?
    } else {
        serde_json::to_string_pretty(&source.list_one_level(path).await?)?
    };
    println!("{}", json);
    Ok(())
}

async fn run(path: &Path, config: &AppConfig) -> error::Result<()> {
    install_panic_hook();

    let mut tui = Tui::new()?;
    let mut events = EventHandler::new(Duration::from_millis(16));
    let event_tx = events.sender();

    let local = Arc::new(LocalBackend::new(config.ignore()).with_git_ttl(config.git_status_ttl()));
    let mut app = App::new(
        local.clone(),
        Arc::new(SyntaxOutlineAnalyzer::new()),
        config,
        event_tx.clone(),
    );
    if config.sidebar_open() {
        app.open_sidebar();
    }

    let (width, height) = tui.size()?;
    app.resize(width, height);
    let (rows, cols) = ui::terminal_size(width, height, app.view.is_sidebar_open(), app.sidebar_width);

    let session = SessionId::new();
    match PtyProcess::spawn(&config.shell(), path, rows, cols, session.clone(), event_tx) {
        Ok(process) => {
            local.register(session.clone(), process.clone());
            app.attach_shell(session, process);
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to start shell");
            app.set_status_message(format!("Failed to start shell: {}", e));
        }
    }

    loop {
        tui.terminal_mut().draw(|frame| {
            ui::render(&mut app, frame);
        })?;

        let event = events.next().await?;
        if let Event::PtyExited(session) = &event {
            local.unregister(session);
        }
        app.handle_event(event);

        if app.should_quit {
            break;
        }
    }

    app.terminal.shutdown();
    tui.restore()?;
    Ok(())
}
