mod app;
mod error;
mod flow;
mod model;
mod msg;
mod platform;
mod prompt;
mod qt;

use std::collections::HashSet;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc as std_mpsc;
use std::thread;

use anyhow::Result;
use clap::{Parser, Subcommand};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use app::App;
use flow::Prompt;
use model::config::{AppConfig, data_dir};
use model::settings::{SettingsStore, TomlSettingsStore};
use msg::Msg;
use platform::Platform;
use prompt::TerminalPrompt;
use qt::designer::{DetachedSpawner, Spawner};

#[derive(Parser)]
#[command(name = "qtpath", version, about = "Locate, register and use Qt installations")]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Add a Qt root folder (prompted when omitted) and scan it
    Register { root: Option<PathBuf> },
    /// Scan the registered root folders again
    Scan,
    /// Choose the default Qt installation
    Select,
    /// List discovered installations; `*` marks the default
    List,
    /// Print the PATH addition for a kit
    Env {
        /// Kit name as printed by `list`
        #[arg(long)]
        kit: Option<String>,
        /// Substitute the current PATH for the placeholder
        #[arg(long)]
        expand: bool,
    },
    /// Export CMake kits for every installation as JSON
    Kits {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the CMake toolchain file of the default installation
    Toolchain,
    /// Ask qmake of the default installation for its host tools directory
    HostBins,
    /// Open a form in Qt Designer
    Designer { file: PathBuf },
    /// List form files under a directory
    UiFiles { dir: Option<PathBuf> },
    /// Read commands from stdin and watch the registered roots
    Session,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    let _guard = init_logging(&config)?;

    tracing::info!("qtpath starting");

    let platform = Platform::current()?;
    let store = TomlSettingsStore::default_location()
        .with_ask_for_default_path(config.session.ask_for_default_path);
    tracing::debug!("settings at {}", store.path().display());
    let mut app = App::new(config, store, TerminalPrompt, DetachedSpawner, platform)?;

    let result = match cli.command {
        Cmd::Session => {
            run_session(app).await?;
            return Ok(ExitCode::SUCCESS);
        }
        Cmd::Register { root } => app.register(root).map(|_| ()),
        Cmd::Scan => app.rescan().map(|_| ()),
        Cmd::Select => app.select().map(|_| ()),
        Cmd::List => app.list(),
        Cmd::Env { kit, expand } => app.env(kit.as_deref(), expand),
        Cmd::Kits { output } => app.kits(output.as_deref()),
        Cmd::Toolchain => app.toolchain(),
        Cmd::HostBins => app.host_bins().await,
        Cmd::Designer { file } => app.open_document(&file).await.map(|_| ()),
        Cmd::UiFiles { dir } => app.ui_files(&dir.unwrap_or_else(|| PathBuf::from("."))),
    };

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) if app.report(&err) => Ok(ExitCode::FAILURE),
        Err(err) => Err(err.into()),
    }
}

/// Logs go to a daily file; stdout is reserved for command output.
fn init_logging(config: &AppConfig) -> Result<WorkerGuard> {
    let log_dir = data_dir();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "qtpath.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_filter));
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_env_filter(filter)
        .init();

    Ok(guard)
}

async fn run_session<S, P, Sp>(mut app: App<S, P, Sp>) -> Result<()>
where
    S: SettingsStore,
    P: Prompt,
    Sp: Spawner,
{
    let (tx, mut rx) = unbounded_channel::<Msg>();
    let (ack_tx, ack_rx) = std_mpsc::channel::<()>();

    // Stdin thread; waits for an ack after each line so prompts own stdin meanwhile.
    spawn_stdin_reader(tx.clone(), ack_rx);

    let tx_signal = tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tx_signal.send(Msg::Quit);
        }
    });

    let mut watcher = root_watcher(tx.clone());
    let mut watched = HashSet::new();
    watch_new_roots(watcher.as_mut(), &app.roots(), &mut watched);

    println!(
        "qtpath session [{}], type help for commands",
        app.state().label()
    );

    // ── Main event loop ──
    while let Some(first) = rx.recv().await {
        let mut batch = vec![first];
        while let Ok(msg) = rx.try_recv() {
            batch.push(msg);
        }

        for msg in batch {
            let from_stdin = matches!(msg, Msg::Input(_));
            app.update(msg).await?;
            if from_stdin {
                let _ = ack_tx.send(());
            }
            if app.should_quit {
                break;
            }
        }

        if app.should_quit {
            break;
        }

        watch_new_roots(watcher.as_mut(), &app.roots(), &mut watched);
    }

    tracing::info!("session ended");
    Ok(())
}

fn spawn_stdin_reader(tx: UnboundedSender<Msg>, ack: std_mpsc::Receiver<()>) {
    thread::spawn(move || {
        let stdin = io::stdin();
        let mut line = String::new();
        loop {
            print!("> ");
            let _ = io::stdout().flush();

            line.clear();
            let msg = match stdin.lock().read_line(&mut line) {
                Ok(0) => Msg::InputClosed,
                Ok(_) => Msg::Input(line.trim_end().to_string()),
                Err(err) => {
                    tracing::warn!("stdin read failed: {err}");
                    Msg::InputClosed
                }
            };

            let closed = msg == Msg::InputClosed;
            if tx.send(msg).is_err() || closed {
                break;
            }
            if ack.recv().is_err() {
                break;
            }
        }
    });
}

/// Emits `RootChanged` for create/modify/remove events under watched roots.
fn root_watcher(tx: UnboundedSender<Msg>) -> Option<RecommendedWatcher> {
    let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
        Ok(event) => {
            if matches!(
                event.kind,
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
            ) {
                for path in event.paths {
                    if tx.send(Msg::RootChanged(path)).is_err() {
                        return;
                    }
                }
            }
        }
        Err(err) => {
            tracing::warn!("root watcher error: {err}");
        }
    });

    match watcher {
        Ok(watcher) => Some(watcher),
        Err(err) => {
            tracing::warn!("failed to initialize root watcher: {err}");
            None
        }
    }
}

fn watch_new_roots(
    watcher: Option<&mut RecommendedWatcher>,
    roots: &[PathBuf],
    watched: &mut HashSet<PathBuf>,
) {
    let Some(watcher) = watcher else {
        return;
    };

    for root in roots {
        if watched.contains(root) || !root.is_dir() {
            continue;
        }
        match watcher.watch(root, RecursiveMode::NonRecursive) {
            Ok(()) => {
                tracing::info!("watching {}", root.display());
                watched.insert(root.clone());
            }
            Err(err) => {
                tracing::warn!("failed to watch {}: {err}", root.display());
            }
        }
    }
}
