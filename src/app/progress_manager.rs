//! Progress UI (spinner) for download runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use paper_harvest::store::{DownloadStatus, PaperStore};

/// Spawns the progress UI (spinner) when requested.
/// Returns (handle, stop) so the caller can signal stop and await the handle.
/// When `use_spinner` is false, returns (None, stop) with stop already true.
pub(crate) fn spawn_progress_ui(
    use_spinner: bool,
    store: PaperStore,
    total: usize,
) -> (Option<tokio::task::JoinHandle<()>>, Arc<AtomicBool>) {
    if !use_spinner {
        return (None, Arc::new(AtomicBool::new(true)));
    }
    let stop = Arc::new(AtomicBool::new(false));
    let handle = spawn_spinner_inner(store, total, Arc::clone(&stop));
    (Some(handle), stop)
}

fn spawn_spinner_inner(
    store: PaperStore,
    total: usize,
    stop: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));

        let baseline = settled_count(&store).await;
        while !stop.load(Ordering::SeqCst) {
            let done = settled_count(&store).await.saturating_sub(baseline);
            let active = store
                .count_by_status(DownloadStatus::Downloading)
                .await
                .unwrap_or(0);

            spinner.set_message(format!(
                "[{}/{}] downloading ({} active)...",
                usize::try_from(done).unwrap_or(0).min(total),
                total,
                active
            ));
            tokio::time::sleep(Duration::from_millis(120)).await;
        }

        spinner.finish_and_clear();
    })
}

/// Completed plus failed records.
async fn settled_count(store: &PaperStore) -> i64 {
    let completed = store
        .count_by_status(DownloadStatus::Completed)
        .await
        .unwrap_or(0);
    let failed = store
        .count_by_status(DownloadStatus::Failed)
        .await
        .unwrap_or(0);
    completed.saturating_add(failed)
}
