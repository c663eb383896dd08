//! Bounded worker pool downloading claimed papers.
//!
//! # Overview
//!
//! The engine claims pending papers from the [`PaperStore`] one at a time
//! (each claim atomically moves the record to `downloading`), and runs each
//! download in its own Tokio task. A semaphore bounds the number of tasks in
//! flight. Every outcome is written back through the store:
//!
//! - `downloading -> completed` with the artifact path
//! - `downloading -> failed` with the last error
//! - `downloading -> pending` when the run is interrupted first
//!
//! # Example
//!
//! ```no_run
//! use paper_harvest::download::{ArtifactClient, DownloadEngine, RateLimiter};
//! use paper_harvest::fetch::{FetchConfig, Fetcher, RetryPolicy};
//! use paper_harvest::store::{PaperFilter, PaperStore};
//! use paper_harvest::Database;
//! use std::path::Path;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = PaperStore::new(Database::new(Path::new("data/papers.db")).await?);
//! let client = ArtifactClient::new(Fetcher::new(&FetchConfig::default())?);
//! let limiter = Arc::new(RateLimiter::new(Duration::from_millis(500)));
//! let engine = DownloadEngine::new(5, RetryPolicy::default(), limiter)?;
//! let stats = engine
//!     .run(&store, &client, Path::new("data/pdfs"), &PaperFilter::default())
//!     .await?;
//! println!("completed {} failed {}", stats.completed(), stats.failed());
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::client::{ArtifactClient, is_complete_artifact};
use super::path::artifact_path;
use super::rate_limiter::RateLimiter;
use super::{DownloadError, EngineError};
use crate::fetch::{RetryDecision, RetryPolicy};
use crate::store::{DownloadStatus, Paper, PaperFilter, PaperStore};

/// Minimum allowed worker count.
pub const MIN_WORKERS: usize = 1;

/// Maximum allowed worker count.
pub const MAX_WORKERS: usize = 100;

/// Default worker count.
pub const DEFAULT_WORKERS: usize = 5;

/// How often a blocked wait re-checks the interrupt flag.
const INTERRUPT_POLL: Duration = Duration::from_millis(50);

/// How long in-flight downloads may run on after an interrupt.
const INTERRUPT_GRACE: Duration = Duration::from_secs(5);

/// Counters for one pool run.
///
/// Atomic so spawned tasks can update them concurrently.
#[derive(Debug, Default)]
pub struct DownloadStats {
    completed: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
    retried: AtomicUsize,
    interrupted: AtomicBool,
}

impl DownloadStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Papers downloaded in this run.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Papers that ended `failed`.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Papers whose artifact was already on disk; marked completed without a request.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::SeqCst)
    }

    /// Retry attempts made across all papers.
    #[must_use]
    pub fn retried(&self) -> usize {
        self.retried.load(Ordering::SeqCst)
    }

    /// Papers that reached a final status.
    #[must_use]
    pub fn total(&self) -> usize {
        self.completed() + self.failed() + self.skipped()
    }

    /// True if the run stopped early because of an interrupt.
    #[must_use]
    pub fn was_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    fn increment_completed(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_retried(&self) {
        self.retried.fetch_add(1, Ordering::SeqCst);
    }

    fn set_interrupted(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }

    fn snapshot(&self) -> Self {
        let copy = Self::new();
        copy.completed.store(self.completed(), Ordering::SeqCst);
        copy.failed.store(self.failed(), Ordering::SeqCst);
        copy.skipped.store(self.skipped(), Ordering::SeqCst);
        copy.retried.store(self.retried(), Ordering::SeqCst);
        copy.interrupted.store(self.was_interrupted(), Ordering::SeqCst);
        copy
    }
}

/// Concurrent download pool.
#[derive(Debug)]
pub struct DownloadEngine {
    semaphore: Arc<Semaphore>,
    workers: usize,
    retry_policy: RetryPolicy,
    rate_limiter: Arc<RateLimiter>,
}

/// Everything a spawned download task needs.
#[derive(Clone)]
struct TaskContext {
    store: PaperStore,
    client: ArtifactClient,
    pdf_dir: PathBuf,
    retry_policy: RetryPolicy,
    rate_limiter: Arc<RateLimiter>,
    stats: Arc<DownloadStats>,
    interrupted: Arc<AtomicBool>,
}

impl DownloadEngine {
    /// Creates a pool of `workers` concurrent downloads.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] outside
    /// [`MIN_WORKERS`]..=[`MAX_WORKERS`].
    #[instrument(level = "debug", skip(retry_policy, rate_limiter))]
    pub fn new(
        workers: usize,
        retry_policy: RetryPolicy,
        rate_limiter: Arc<RateLimiter>,
    ) -> Result<Self, EngineError> {
        if !(MIN_WORKERS..=MAX_WORKERS).contains(&workers) {
            return Err(EngineError::InvalidConcurrency { value: workers });
        }

        debug!(
            workers,
            max_attempts = retry_policy.max_attempts(),
            delay_ms = rate_limiter.delay().as_millis(),
            "creating download engine"
        );

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(workers)),
            workers,
            retry_policy,
            rate_limiter,
        })
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Downloads every pending paper matching `filter`.
    ///
    /// # Errors
    ///
    /// See [`Self::run_interruptible`].
    pub async fn run(
        &self,
        store: &PaperStore,
        client: &ArtifactClient,
        pdf_dir: &Path,
        filter: &PaperFilter,
    ) -> Result<DownloadStats, EngineError> {
        self.run_interruptible(store, client, pdf_dir, filter, Arc::new(AtomicBool::new(false)))
            .await
    }

    /// Downloads pending papers until none are left, `filter.limit` papers
    /// were claimed, or `interrupted` becomes true.
    ///
    /// After an interrupt no new paper is claimed; in-flight downloads get
    /// a short grace period, then are aborted and put back to `pending`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if claiming work fails (after waiting
    /// for in-flight downloads) and [`EngineError::SemaphoreClosed`] if the
    /// pool's semaphore is closed. Individual download failures are counted,
    /// never returned.
    #[instrument(skip(self, store, client, filter, interrupted), fields(pdf_dir = %pdf_dir.display()))]
    pub async fn run_interruptible(
        &self,
        store: &PaperStore,
        client: &ArtifactClient,
        pdf_dir: &Path,
        filter: &PaperFilter,
        interrupted: Arc<AtomicBool>,
    ) -> Result<DownloadStats, EngineError> {
        let stats = Arc::new(DownloadStats::new());
        let context = TaskContext {
            store: store.clone(),
            client: client.clone(),
            pdf_dir: pdf_dir.to_path_buf(),
            retry_policy: self.retry_policy.clone(),
            rate_limiter: Arc::clone(&self.rate_limiter),
            stats: Arc::clone(&stats),
            interrupted: Arc::clone(&interrupted),
        };
        let mut handles: Vec<(i64, JoinHandle<()>)> = Vec::new();
        let mut claimed: i64 = 0;
        let mut claim_error = None;

        info!(workers = self.workers, "starting download pool");

        loop {
            if interrupted.load(Ordering::SeqCst) {
                stats.set_interrupted();
                break;
            }
            if filter.limit.is_some_and(|limit| claimed >= limit) {
                debug!(claimed, "claim limit reached");
                break;
            }

            // Wait for a free worker first so a claimed paper never sits in
            // `downloading` while the pool is full.
            let permit = tokio::select! {
                biased;
                () = wait_for_interrupt(&interrupted) => None,
                result = Arc::clone(&self.semaphore).acquire_owned() => {
                    Some(result.map_err(|_| EngineError::SemaphoreClosed)?)
                }
            };
            let Some(permit) = permit else {
                stats.set_interrupted();
                break;
            };

            let paper = match store.claim_next_pending(filter).await {
                Ok(Some(paper)) => paper,
                Ok(None) => break,
                Err(error) => {
                    warn!(error = %error, "failed to claim next paper");
                    claim_error = Some(error);
                    break;
                }
            };
            claimed += 1;
            debug!(paper_id = paper.id, "claimed paper");

            let context = context.clone();
            let paper_id = paper.id;
            handles.push((
                paper_id,
                tokio::spawn(async move {
                    let _permit = permit;
                    process_paper(&context, paper).await;
                }),
            ));
        }

        debug!(task_count = handles.len(), "waiting for downloads to finish");
        if interrupted.load(Ordering::SeqCst) {
            stats.set_interrupted();
            let deadline = tokio::time::Instant::now() + INTERRUPT_GRACE;
            for (paper_id, mut handle) in handles {
                match tokio::time::timeout_at(deadline, &mut handle).await {
                    Ok(Ok(())) => {}
                    Ok(Err(error)) => handle_join_error(store, paper_id, &error, &stats).await,
                    Err(_) => {
                        debug!(paper_id, "aborting download after grace period");
                        handle.abort();
                    }
                }
            }
            match store.requeue_stale_downloads().await {
                Ok(0) => {}
                Ok(requeued) => info!(requeued, "unfinished downloads returned to pending"),
                Err(error) => warn!(error = %error, "failed to requeue unfinished downloads"),
            }
        } else {
            for (paper_id, handle) in handles {
                if let Err(error) = handle.await {
                    handle_join_error(store, paper_id, &error, &stats).await;
                }
            }
        }

        info!(
            completed = stats.completed(),
            failed = stats.failed(),
            skipped = stats.skipped(),
            retried = stats.retried(),
            interrupted = stats.was_interrupted(),
            "download pool finished"
        );

        drop(context);
        if let Some(error) = claim_error {
            return Err(error.into());
        }
        Ok(Arc::try_unwrap(stats).unwrap_or_else(|shared| shared.snapshot()))
    }
}

async fn wait_for_interrupt(flag: &AtomicBool) {
    while !flag.load(Ordering::SeqCst) {
        tokio::time::sleep(INTERRUPT_POLL).await;
    }
}

async fn handle_join_error(
    store: &PaperStore,
    paper_id: i64,
    error: &tokio::task::JoinError,
    stats: &DownloadStats,
) {
    if error.is_cancelled() {
        return;
    }
    warn!(paper_id, error = %error, "download task panicked");
    let message = format!("worker panicked: {error}");
    if let Err(store_error) = store
        .set_download_status(paper_id, DownloadStatus::Failed, None, Some(message.as_str()))
        .await
    {
        warn!(paper_id, error = %store_error, "failed to mark paper failed");
    }
    stats.increment_failed();
}

/// Downloads one claimed paper and records the outcome.
#[instrument(skip(context, paper), fields(paper_id = paper.id))]
async fn process_paper(context: &TaskContext, paper: Paper) {
    let store = &context.store;
    let Some(url) = paper.pdf_url().map(ToString::to_string) else {
        record_failure(context, &paper, "record has no pdf_url").await;
        return;
    };
    let dest = artifact_path(&context.pdf_dir, &paper);

    if is_complete_artifact(&dest).await {
        info!(path = %dest.display(), "artifact already on disk");
        record_completed(context, &paper, &dest).await;
        context.stats.increment_skipped();
        return;
    }

    match download_with_retry(context, &url, &dest).await {
        Ok(bytes) => {
            info!(bytes, path = %dest.display(), "download completed");
            record_completed(context, &paper, &dest).await;
            context.stats.increment_completed();
        }
        Err(DownloadError::Cancelled { .. }) => {
            debug!("download cancelled before completion");
            if let Err(error) = store
                .set_download_status(paper.id, DownloadStatus::Pending, None, Some("interrupted"))
                .await
            {
                warn!(error = %error, "failed to return paper to pending");
            }
        }
        Err(error) => {
            warn!(url = %url, error = %error, "download failed");
            record_failure(context, &paper, &error.to_string()).await;
        }
    }
}

async fn record_completed(context: &TaskContext, paper: &Paper, dest: &Path) {
    let path = dest.to_string_lossy();
    if let Err(error) = context
        .store
        .set_download_status(paper.id, DownloadStatus::Completed, Some(path.as_ref()), None)
        .await
    {
        warn!(paper_id = paper.id, error = %error, "failed to mark paper completed");
    }
}

async fn record_failure(context: &TaskContext, paper: &Paper, message: &str) {
    if let Err(error) = context
        .store
        .set_download_status(paper.id, DownloadStatus::Failed, None, Some(message))
        .await
    {
        warn!(paper_id = paper.id, error = %error, "failed to mark paper failed");
    }
    context.stats.increment_failed();
}

/// Attempts the download until it succeeds, fails permanently, runs out of
/// attempts, or the run is interrupted.
async fn download_with_retry(
    context: &TaskContext,
    url: &str,
    dest: &Path,
) -> Result<u64, DownloadError> {
    let policy = &context.retry_policy;
    let mut attempt = 1;

    loop {
        if context.interrupted.load(Ordering::SeqCst) {
            return Err(DownloadError::Cancelled {
                url: url.to_string(),
            });
        }
        context.rate_limiter.acquire(url).await;
        debug!(attempt, "attempting download");

        let error = match context.client.download(url, dest).await {
            Ok(bytes) => return Ok(bytes),
            Err(error) if !error.is_retryable() => return Err(error),
            Err(error) => error,
        };

        match policy.should_retry(attempt) {
            RetryDecision::Retry {
                delay,
                attempt: next,
            } => {
                info!(
                    url = %url,
                    attempt = next,
                    max_attempts = policy.max_attempts(),
                    delay_ms = delay.as_millis(),
                    error = %error,
                    "retrying download"
                );
                context.stats.increment_retried();
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    () = wait_for_interrupt(&context.interrupted) => {}
                }
                attempt = next;
            }
            RetryDecision::DoNotRetry { reason } => {
                debug!(url = %url, %reason, "not retrying download");
                return Err(error);
            }
        }
    }
}
