use std::io::{self, IsTerminal};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use clap::Parser;
use paper_harvest::Database;
use paper_harvest::fetch::Fetcher;
use paper_harvest::store::PaperStore;
use tracing::{debug, info, warn};

use crate::app::{config_manager, context::RunContext, terminal};
use crate::cli::{Cli, Command};
use crate::commands;

/// Parses the CLI, resolves configuration, opens the store and runs the
/// requested command.
///
/// Only startup problems (bad config, unusable database, unknown venue)
/// are returned as errors; per-item failures end up in the printed counts.
pub(crate) async fn run_harvester() -> Result<()> {
    let cli = Cli::parse();
    let settings = config_manager::resolve_config(&cli)?;

    let default_level =
        terminal::resolve_default_log_level(cli.quiet, cli.verbose, settings.verbosity);
    terminal::init_tracing(default_level);
    debug!(?cli, "CLI arguments parsed");
    match &settings.config_file {
        Some(path) => debug!(path = %path.display(), "Loaded config file"),
        None => debug!("No config file found; using defaults"),
    }

    if matches!(cli.command, Command::Venues) {
        commands::run_venues_command();
        return Ok(());
    }

    let db = Database::new(&settings.db_path)
        .await
        .with_context(|| format!("Failed to open database '{}'", settings.db_path.display()))?;
    let store = PaperStore::new(db);
    let fetcher = Fetcher::new(&settings.fetch).context("Failed to build HTTP client")?;
    info!(db = %settings.db_path.display(), "Paper harvest starting");

    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_signal = Arc::clone(&interrupted);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; finishing in-flight work");
            interrupted_signal.store(true, Ordering::SeqCst);
        }
    });

    let use_spinner = terminal::should_use_spinner(
        io::stderr().is_terminal(),
        cli.quiet,
        terminal::is_dumb_terminal(),
    );

    let ctx = RunContext {
        settings,
        store,
        fetcher,
        interrupted,
        use_spinner,
    };

    match &cli.command {
        Command::Ingest(args) => {
            commands::run_ingest_command(&ctx, args).await?;
        }
        Command::Download(args) => {
            commands::run_download_command(&ctx, &args.scope, &args.pool).await?;
        }
        Command::Retry(args) => {
            commands::run_retry_command(&ctx, &args.scope, &args.pool).await?;
        }
        Command::Enrich(scope) => {
            commands::run_enrich_command(&ctx, scope).await?;
        }
        Command::Stats => {
            commands::run_stats_command(&ctx).await?;
        }
        Command::All(args) => {
            commands::run_all_command(&ctx, args).await?;
        }
        Command::Venues => commands::run_venues_command(),
    }

    if ctx.is_interrupted() {
        warn!("Interrupted. Run again to resume.");
    }
    Ok(())
}
