//! Ingest coordinator: drives source adapters over (source, venue, year)
//! tasks and feeds the records into the paper store.
//!
//! Each task moves through `not_started -> fetched -> stored | failed`. A
//! failed task never aborts the run; the next task starts regardless.
//! Duplicate records are counted as skips, and a record the store rejects
//! for any other reason is counted and logged without stopping the task.

use std::fmt;

use tracing::{info, instrument, warn};

use crate::sources::{AdapterRegistry, SourceKind, Venue};
use crate::store::{NewPaper, PaperRepository};

/// One unit of crawl work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceTask {
    pub source: SourceKind,
    pub venue: &'static Venue,
    pub year: i32,
}

impl SourceTask {
    #[must_use]
    pub fn new(source: SourceKind, venue: &'static Venue, year: i32) -> Self {
        Self {
            source,
            venue,
            year,
        }
    }

    /// Cartesian product of venues and years, venue-major.
    #[must_use]
    pub fn expand(source: SourceKind, venues: &[&'static Venue], years: &[i32]) -> Vec<Self> {
        venues
            .iter()
            .copied()
            .flat_map(|venue| years.iter().map(move |year| Self::new(source, venue, *year)))
            .collect()
    }
}

impl fmt::Display for SourceTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.venue.conference, self.year, self.source)
    }
}

/// Lifecycle of a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    NotStarted,
    Fetched,
    Stored,
    Failed,
}

impl TaskState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Fetched => "fetched",
            Self::Stored => "stored",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one task.
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub task: SourceTask,
    pub state: TaskState,
    /// Records returned by the adapter.
    pub fetched: usize,
    /// Records newly written.
    pub inserted: usize,
    /// Records already present.
    pub skipped: usize,
    /// Records the store rejected.
    pub store_errors: usize,
    /// Why the task failed, when it did.
    pub error: Option<String>,
}

impl TaskReport {
    fn new(task: SourceTask) -> Self {
        Self {
            task,
            state: TaskState::NotStarted,
            fetched: 0,
            inserted: 0,
            skipped: 0,
            store_errors: 0,
            error: None,
        }
    }
}

/// Aggregate over all tasks of a run.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub tasks: Vec<TaskReport>,
}

impl IngestReport {
    #[must_use]
    pub fn fetched(&self) -> usize {
        self.tasks.iter().map(|t| t.fetched).sum()
    }

    #[must_use]
    pub fn inserted(&self) -> usize {
        self.tasks.iter().map(|t| t.inserted).sum()
    }

    #[must_use]
    pub fn skipped(&self) -> usize {
        self.tasks.iter().map(|t| t.skipped).sum()
    }

    #[must_use]
    pub fn store_errors(&self) -> usize {
        self.tasks.iter().map(|t| t.store_errors).sum()
    }

    /// Number of tasks that ended in [`TaskState::Failed`].
    #[must_use]
    pub fn failed_tasks(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.state == TaskState::Failed)
            .count()
    }
}

/// Runs crawl tasks sequentially against one store.
pub struct IngestCoordinator<'a> {
    registry: &'a AdapterRegistry,
    store: &'a dyn PaperRepository,
}

impl<'a> IngestCoordinator<'a> {
    #[must_use]
    pub fn new(registry: &'a AdapterRegistry, store: &'a dyn PaperRepository) -> Self {
        Self { registry, store }
    }

    /// Runs every task in order and returns the aggregate report.
    pub async fn run(&self, tasks: &[SourceTask]) -> IngestReport {
        let mut report = IngestReport::default();
        for task in tasks {
            report.tasks.push(self.run_task(*task).await);
        }
        info!(
            tasks = report.tasks.len(),
            fetched = report.fetched(),
            inserted = report.inserted(),
            skipped = report.skipped(),
            failed_tasks = report.failed_tasks(),
            "ingest finished"
        );
        report
    }

    /// Runs one task. Never fails; failures are recorded in the report.
    #[instrument(skip(self), fields(venue = %task.venue.tag, year = task.year, source = %task.source))]
    pub async fn run_task(&self, task: SourceTask) -> TaskReport {
        let mut report = TaskReport::new(task);

        let papers = match self.crawl(task).await {
            Ok(papers) => papers,
            Err(message) => {
                warn!(error = %message, "task failed");
                report.state = TaskState::Failed;
                report.error = Some(message);
                return report;
            }
        };
        report.state = TaskState::Fetched;
        report.fetched = papers.len();

        for paper in &papers {
            match self.store.insert(paper).await {
                Ok(_) => report.inserted += 1,
                Err(e) if e.is_already_exists() => report.skipped += 1,
                Err(e) => {
                    warn!(title = %paper.title, error = %e, "failed to store paper");
                    report.store_errors += 1;
                }
            }
        }

        report.state = TaskState::Stored;
        info!(
            fetched = report.fetched,
            inserted = report.inserted,
            skipped = report.skipped,
            store_errors = report.store_errors,
            "task stored"
        );
        report
    }

    async fn crawl(&self, task: SourceTask) -> Result<Vec<NewPaper>, String> {
        let adapter = self
            .registry
            .adapter_for(task.source, task.venue)
            .map_err(|e| e.to_string())?;
        adapter
            .crawl(task.venue, task.year)
            .await
            .map_err(|e| e.to_string())
    }
}

impl fmt::Debug for IngestCoordinator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestCoordinator")
            .field("registry", self.registry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::fetch::FetchError;
    use crate::sources::{SourceAdapter, SourceError, find_venue};
    use crate::store::PaperStore;
    use async_trait::async_trait;

    /// Returns two records for 2024 and fails every other year.
    struct FixedAdapter;

    #[async_trait]
    impl SourceAdapter for FixedAdapter {
        fn name(&self) -> &str {
            "dblp"
        }

        async fn crawl(&self, venue: &Venue, year: i32) -> Result<Vec<NewPaper>, SourceError> {
            if year != 2024 {
                return Err(SourceError::Fetch(FetchError::exhausted(
                    "https://dblp.org/search/publ/api",
                    3,
                    Some(503),
                    "HTTP 503",
                )));
            }
            let papers = ["First Paper", "Second Paper"]
                .into_iter()
                .map(|title| {
                    let mut paper = NewPaper::new(title, venue.conference);
                    paper.year = Some(year);
                    paper
                })
                .collect();
            Ok(papers)
        }
    }

    async fn setup() -> (AdapterRegistry, PaperStore) {
        let mut registry = AdapterRegistry::new();
        registry.register(Box::new(FixedAdapter));
        let store = PaperStore::new(Database::new_in_memory().await.unwrap());
        (registry, store)
    }

    #[test]
    fn test_expand_is_venue_major() {
        let crypto = find_venue("crypto").unwrap();
        let ndss = find_venue("ndss").unwrap();
        let tasks = SourceTask::expand(SourceKind::Dblp, &[crypto, ndss], &[2023, 2024]);
        let labels: Vec<String> = tasks.iter().map(ToString::to_string).collect();
        assert_eq!(
            labels,
            vec![
                "CRYPTO 2023 (dblp)",
                "CRYPTO 2024 (dblp)",
                "NDSS 2023 (dblp)",
                "NDSS 2024 (dblp)"
            ]
        );
    }

    #[tokio::test]
    async fn test_run_task_inserts_then_skips_on_rerun() {
        let (registry, store) = setup().await;
        let coordinator = IngestCoordinator::new(&registry, &store);
        let task = SourceTask::new(SourceKind::Dblp, find_venue("crypto").unwrap(), 2024);

        let first = coordinator.run_task(task).await;
        assert_eq!(first.state, TaskState::Stored);
        assert_eq!((first.fetched, first.inserted, first.skipped), (2, 2, 0));

        let second = coordinator.run_task(task).await;
        assert_eq!(second.state, TaskState::Stored);
        assert_eq!((second.fetched, second.inserted, second.skipped), (2, 0, 2));
    }

    #[tokio::test]
    async fn test_failed_task_does_not_stop_run() {
        let (registry, store) = setup().await;
        let coordinator = IngestCoordinator::new(&registry, &store);
        let crypto = find_venue("crypto").unwrap();
        let tasks = SourceTask::expand(SourceKind::Dblp, &[crypto], &[2023, 2024]);

        let report = coordinator.run(&tasks).await;

        assert_eq!(report.failed_tasks(), 1);
        assert_eq!(report.tasks[0].state, TaskState::Failed);
        assert!(report.tasks[0].error.as_deref().unwrap().contains("503"));
        assert_eq!(report.inserted(), 2);
        assert_eq!(report.fetched(), 2);
    }

    #[tokio::test]
    async fn test_missing_adapter_fails_task() {
        let (registry, store) = setup().await;
        let coordinator = IngestCoordinator::new(&registry, &store);
        let task = SourceTask::new(SourceKind::Site, find_venue("ndss").unwrap(), 2024);

        let report = coordinator.run_task(task).await;
        assert_eq!(report.state, TaskState::Failed);
        assert_eq!(report.fetched, 0);
    }

    #[tokio::test]
    async fn test_invalid_record_counted_as_store_error() {
        struct BlankTitle;

        #[async_trait]
        impl SourceAdapter for BlankTitle {
            fn name(&self) -> &str {
                "dblp"
            }

            async fn crawl(&self, venue: &Venue, _year: i32) -> Result<Vec<NewPaper>, SourceError> {
                Ok(vec![
                    NewPaper::new("  ", venue.conference),
                    NewPaper::new("Kept", venue.conference),
                ])
            }
        }

        let mut registry = AdapterRegistry::new();
        registry.register(Box::new(BlankTitle));
        let store = PaperStore::new(Database::new_in_memory().await.unwrap());
        let coordinator = IngestCoordinator::new(&registry, &store);
        let task = SourceTask::new(SourceKind::Dblp, find_venue("ccs").unwrap(), 2024);

        let report = coordinator.run_task(task).await;
        assert_eq!(report.state, TaskState::Stored);
        assert_eq!((report.inserted, report.store_errors), (1, 1));
    }
}
