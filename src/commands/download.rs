use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use paper_harvest::download::{ArtifactClient, DownloadEngine, DownloadStats, RateLimiter};
use paper_harvest::store::{DownloadStatus, PaperFilter};
use tracing::{debug, info};

use crate::app::config_manager::Settings;
use crate::app::context::RunContext;
use crate::app::progress_manager;
use crate::cli::{PoolArgs, ScopeArgs};

pub(crate) fn scope_filter(scope: &ScopeArgs) -> PaperFilter {
    PaperFilter::scoped(scope.conference.clone(), scope.year).with_limit(scope.limit)
}

pub(crate) async fn run_download_command(
    ctx: &RunContext,
    scope: &ScopeArgs,
    pool: &PoolArgs,
) -> Result<DownloadStats> {
    let settings = ctx.settings.with_pool(pool);
    run_download(ctx, &settings, &scope_filter(scope)).await
}

/// The explicit `failed -> pending` reset followed by a download run.
pub(crate) async fn run_retry_command(
    ctx: &RunContext,
    scope: &ScopeArgs,
    pool: &PoolArgs,
) -> Result<DownloadStats> {
    let reset = ctx
        .store
        .reset_failed(&PaperFilter::scoped(scope.conference.clone(), scope.year))
        .await
        .context("Failed to reset failed downloads")?;
    println!("Reset {reset} failed download(s) to pending");
    run_download_command(ctx, scope, pool).await
}

pub(crate) async fn run_download(
    ctx: &RunContext,
    settings: &Settings,
    filter: &PaperFilter,
) -> Result<DownloadStats> {
    let requeued = ctx.store.requeue_stale_downloads().await?;
    if requeued > 0 {
        info!(requeued, "Requeued downloads left over from an interrupted run");
    }

    let pending_filter = filter.clone().with_status(DownloadStatus::Pending);
    let total = ctx
        .store
        .query(&pending_filter)
        .await?
        .iter()
        .filter(|paper| paper.pdf_url().is_some())
        .count();
    if total == 0 {
        println!("No pending papers with a PDF URL");
        return Ok(DownloadStats::default());
    }

    let rate_limiter = if settings.download_delay.is_zero() {
        debug!("per-host spacing disabled");
        Arc::new(RateLimiter::disabled())
    } else {
        Arc::new(RateLimiter::new(settings.download_delay))
    };
    let engine = DownloadEngine::new(
        settings.workers,
        ctx.fetcher.retry_policy().clone(),
        rate_limiter,
    )
    .context("invalid download engine configuration")?;
    let client = ArtifactClient::new(ctx.fetcher.clone());

    info!(
        total,
        workers = settings.workers,
        pdf_dir = %settings.pdf_dir.display(),
        "Starting downloads"
    );
    let (progress_handle, progress_stop) =
        progress_manager::spawn_progress_ui(ctx.use_spinner, ctx.store.clone(), total);

    let result = engine
        .run_interruptible(
            &ctx.store,
            &client,
            &settings.pdf_dir,
            filter,
            Arc::clone(&ctx.interrupted),
        )
        .await;

    progress_stop.store(true, Ordering::SeqCst);
    if let Some(handle) = progress_handle {
        let _ = handle.await;
    }

    let stats = result.context("download run failed")?;
    print_download_summary(&stats);
    Ok(stats)
}

fn print_download_summary(stats: &DownloadStats) {
    println!(
        "Download: {} downloaded, {} already on disk, {} failed, {} retries",
        stats.completed(),
        stats.skipped(),
        stats.failed(),
        stats.retried()
    );
    if stats.failed() > 0 {
        println!("Run `paper-harvest retry` to reset failed downloads and try again");
    }
    if stats.was_interrupted() {
        println!("Interrupted; unfinished papers were returned to pending");
    }
}
