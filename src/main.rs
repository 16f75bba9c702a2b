use std::{
    panic,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use uuid::Uuid;

use taskboard::{
    cli::{self, CliContext, RootCommand},
    logging::{init_logging, print_log_location},
    notification::notice_channel,
    settings::Settings,
    store::{SqliteTaskStore, spawn_change_poller},
    sync::{BoardSync, spawn_realtime_listener},
    tui,
};

#[derive(Parser, Debug)]
#[command(
    name = "taskboard",
    about = "Personal kanban board and timeline in the terminal",
    long_about = "A three-column task board with a day timeline. Cards move by mouse drag or by keyboard, and every move is persisted as one batch of rank updates.",
    version = env!("TASKBOARD_BUILD_VERSION"),
    author
)]
struct Cli {
    /// SQLite database file; defaults to the settings value or the data directory
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Act as this user instead of the one stored in the settings
    #[arg(long, global = true, value_name = "UUID")]
    user: Option<Uuid>,

    #[arg(long, global = true)]
    json: bool,

    #[arg(long)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<RootCommand>,
}

enum RunOutcome {
    Continue,
    Exit(i32),
}

#[tokio::main]
async fn main() -> Result<()> {
    let log = match init_logging() {
        Ok(handle) => Some(handle),
        Err(err) => {
            eprintln!("warning: failed to initialize logging: {err}");
            None
        }
    };
    let log_path = log.as_ref().map(|handle| handle.path.clone());
    install_panic_hook(log_path.clone());

    match run_app().await {
        Ok(RunOutcome::Continue) => Ok(()),
        Ok(RunOutcome::Exit(code)) => {
            drop(log);
            std::process::exit(code);
        }
        Err(err) => {
            if let Some(path) = log_path.as_ref() {
                print_log_location(path);
            }
            Err(err)
        }
    }
}

async fn run_app() -> Result<RunOutcome> {
    let cli = Cli::parse();

    let mut settings = Settings::load();
    let owner = match cli.user {
        Some(user) => user,
        None => settings.ensure_user_id()?,
    };
    let db_path = cli
        .db
        .or_else(|| settings.database_path())
        .ok_or_else(|| anyhow!("failed to determine database path; pass --db"))?;
    let store = Arc::new(
        SqliteTaskStore::open(&db_path)
            .await
            .with_context(|| format!("failed to open board database {}", db_path.display()))?,
    );
    tracing::info!(owner = %owner, db = %db_path.display(), "board database opened");

    match cli.command {
        None | Some(RootCommand::Board) => {
            run_board(store, owner, &settings).await?;
            Ok(RunOutcome::Continue)
        }
        Some(command) => {
            let context = CliContext {
                store,
                owner,
                poll_interval_ms: settings.poll_interval_ms,
            };
            let code = cli::run(context, command, cli.json, cli.quiet).await;
            Ok(RunOutcome::Exit(code))
        }
    }
}

async fn run_board(
    store: Arc<SqliteTaskStore>,
    owner: Uuid,
    settings: &Settings,
) -> Result<()> {
    let (notifier, notices) = notice_channel();
    let sync = Arc::new(BoardSync::new(store.clone(), owner, notifier));

    let feed = sync.change_feed();
    sync.load().await.context("failed to load the board")?;
    let listener = spawn_realtime_listener(Arc::clone(&sync), feed);

    let stop = Arc::new(AtomicBool::new(false));
    let poller = spawn_change_poller(store, Arc::clone(&stop), settings.poll_interval_ms);

    let result = tui::run(Arc::clone(&sync), notices, settings).await;

    stop.store(true, Ordering::SeqCst);
    listener.abort();
    if let Err(err) = poller.await {
        tracing::warn!(error = %err, "change poller ended abnormally");
    }
    result
}

fn install_panic_hook(log_path: Option<PathBuf>) {
    let previous_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        tui::restore_terminal();
        if let Some(path) = log_path.as_ref() {
            print_log_location(path);
        }
        previous_hook(panic_info);
    }));
}
