//! Paper store: `SQLite`-backed persistence for paper records.
//!
//! The store owns two tables: `papers`, holding one row per de-duplicated
//! paper with its download status, and `download_log`, an append-only audit
//! trail written in the same transaction as every status change.
//!
//! # Overview
//!
//! - [`PaperStore`] - Main interface for store operations
//! - [`Paper`] / [`NewPaper`] / [`PaperPatch`] - Row, insert and update shapes
//! - [`DownloadStatus`] - `pending -> downloading -> completed | failed`
//! - [`StoreError`] - Operation error types
//!
//! # Example
//!
//! ```ignore
//! use paper_harvest::store::{NewPaper, PaperStore};
//! use paper_harvest::Database;
//!
//! let db = Database::new_in_memory().await?;
//! let store = PaperStore::new(db);
//!
//! let id = store.insert(&NewPaper::new("A Paper", "CRYPTO")).await?;
//! let paper = store.get(id).await?;
//! ```

mod error;
mod paper;
mod repository;

pub use error::{StoreDbErrorKind, StoreError};
pub use paper::{
    AUTHOR_SEPARATOR, DownloadAttempt, DownloadStatus, NewPaper, Paper, PaperFilter, PaperPatch,
    StoreStatistics, normalize_title,
};
pub use repository::PaperRepository;

use sqlx::Row;
use tracing::{debug, instrument};

use crate::db::Database;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Returns `Ok(())` if at least one row was affected; otherwise [`StoreError::ItemNotFound`].
fn check_affected(id: i64, rows_affected: u64) -> Result<()> {
    if rows_affected == 0 {
        Err(StoreError::ItemNotFound(id))
    } else {
        Ok(())
    }
}

/// Renders the predecessor set of `status` as a SQL `IN` list.
fn predecessor_list(status: DownloadStatus) -> String {
    status
        .allowed_predecessors()
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Persistent store of paper records.
///
/// Cheap to clone; clones share the same connection pool.
#[derive(Debug, Clone)]
pub struct PaperStore {
    db: Database,
}

impl PaperStore {
    /// Creates a store over the given database connection.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Inserts a new paper with `pending` status.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] when the de-duplication key (or
    /// DBLP key) is already stored, [`StoreError::InvalidRecord`] for a blank
    /// title/conference, and [`StoreError::Database`] for other failures.
    #[instrument(skip(self, paper), fields(conference = %paper.conference, year = ?paper.year))]
    pub async fn insert(&self, paper: &NewPaper) -> Result<i64> {
        paper.validate()?;
        let dedup_key = paper.dedup_key();

        let result = sqlx::query(
            r"INSERT INTO papers (
                title, authors, abstract, year, conference,
                url, pdf_url, doi, dblp_key, dedup_key, notes, download_status
              )
              VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
              RETURNING id",
        )
        .bind(paper.title.trim())
        .bind(paper.authors_joined())
        .bind(non_blank(paper.abstract_text.as_deref()))
        .bind(paper.year)
        .bind(paper.conference.trim())
        .bind(non_blank(paper.url.as_deref()))
        .bind(non_blank(paper.pdf_url.as_deref()))
        .bind(non_blank(paper.doi.as_deref()))
        .bind(non_blank(paper.dblp_key.as_deref()))
        .bind(&dedup_key)
        .bind(non_blank(paper.notes.as_deref()))
        .bind(DownloadStatus::Pending.as_str())
        .fetch_one(self.db.pool())
        .await;

        match result {
            Ok(row) => {
                let id: i64 = row.get("id");
                debug!(id, dedup_key = %dedup_key, "inserted paper");
                Ok(id)
            }
            Err(err) => {
                let err = StoreError::from(err);
                if err.database_kind() == Some(StoreDbErrorKind::UniqueViolation) {
                    debug!(dedup_key = %dedup_key, "paper already stored");
                    Err(StoreError::AlreadyExists { dedup_key })
                } else {
                    Err(err)
                }
            }
        }
    }

    /// Merges `patch` into the stored record and refreshes `updated_at`.
    ///
    /// The field merge and the note append commit together or not at all.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ItemNotFound`] if no paper has this id.
    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: i64, patch: &PaperPatch) -> Result<()> {
        if let Some(title) = patch.title.as_deref()
            && title.trim().is_empty()
        {
            return Err(StoreError::invalid_record("title is empty"));
        }
        let authors = patch
            .authors
            .as_ref()
            .map(|names| names.join(AUTHOR_SEPARATOR));

        let mut tx = self.db.pool().begin().await?;
        let result = sqlx::query(
            r"UPDATE papers SET
                title = COALESCE(?, title),
                authors = COALESCE(?, authors),
                abstract = COALESCE(?, abstract),
                year = COALESCE(?, year),
                doi = COALESCE(?, doi),
                url = COALESCE(?, url),
                pdf_url = COALESCE(?, pdf_url),
                notes = COALESCE(?, notes),
                updated_at = datetime('now')
              WHERE id = ?",
        )
        .bind(patch.title.as_deref().map(str::trim))
        .bind(authors)
        .bind(patch.abstract_text.as_deref())
        .bind(patch.year)
        .bind(patch.doi.as_deref())
        .bind(patch.url.as_deref())
        .bind(patch.pdf_url.as_deref())
        .bind(patch.notes.as_deref())
        .bind(id)
        .execute(&mut *tx)
        .await?;
        check_affected(id, result.rows_affected())?;

        if let Some(note) = non_blank(patch.append_note.as_deref()) {
            sqlx::query(
                r"UPDATE papers SET
                    notes = CASE
                        WHEN notes IS NULL OR notes = '' THEN ?
                        ELSE notes || char(10) || ?
                    END,
                    updated_at = datetime('now')
                  WHERE id = ?",
            )
            .bind(note)
            .bind(note)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(id, "updated paper");
        Ok(())
    }

    /// Fetches one paper by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn get(&self, id: i64) -> Result<Option<Paper>> {
        let paper = sqlx::query_as::<_, Paper>("SELECT * FROM papers WHERE id = ?")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(paper)
    }

    /// Returns papers matching `filter`, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn query(&self, filter: &PaperFilter) -> Result<Vec<Paper>> {
        let status = filter.status.map(|s| s.as_str());
        let papers = sqlx::query_as::<_, Paper>(
            r"SELECT * FROM papers
              WHERE (? IS NULL OR conference = ?)
                AND (? IS NULL OR year = ?)
                AND (? IS NULL OR download_status = ?)
                AND (? = 0 OR abstract IS NULL OR trim(abstract) = '')
              ORDER BY id ASC
              LIMIT ?",
        )
        .bind(filter.conference.as_deref())
        .bind(filter.conference.as_deref())
        .bind(filter.year)
        .bind(filter.year)
        .bind(status)
        .bind(status)
        .bind(filter.missing_abstract)
        .bind(filter.limit.unwrap_or(-1))
        .fetch_all(self.db.pool())
        .await?;
        Ok(papers)
    }

    /// Moves a paper to `status` and appends a download-log entry, atomically.
    ///
    /// Only legal transitions apply (see [`DownloadStatus::allowed_predecessors`]);
    /// a record without a PDF URL never leaves `pending`, and `completed`
    /// requires `pdf_path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ItemNotFound`] for an unknown id,
    /// [`StoreError::InvalidTransition`] for an illegal status change and
    /// [`StoreError::InvalidRecord`] for `completed` without a path.
    #[instrument(skip(self, error_message), fields(status = %status))]
    pub async fn set_download_status(
        &self,
        id: i64,
        status: DownloadStatus,
        pdf_path: Option<&str>,
        error_message: Option<&str>,
    ) -> Result<()> {
        let pdf_path = match status {
            DownloadStatus::Completed => Some(
                non_blank(pdf_path)
                    .ok_or_else(|| StoreError::invalid_record("completed requires a pdf_path"))?,
            ),
            _ => None,
        };

        let mut tx = self.db.pool().begin().await?;

        let sql = format!(
            r"UPDATE papers SET
                download_status = ?,
                pdf_path = ?,
                updated_at = datetime('now')
              WHERE id = ?
                AND download_status IN ({})
                AND (? <> 'downloading' OR (pdf_url IS NOT NULL AND trim(pdf_url) <> ''))",
            predecessor_list(status)
        );
        let result = sqlx::query(&sql)
            .bind(status.as_str())
            .bind(pdf_path)
            .bind(id)
            .bind(status.as_str())
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            let current: Option<String> =
                sqlx::query_scalar("SELECT download_status FROM papers WHERE id = ?")
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?;
            tx.rollback().await?;
            return match current {
                None => Err(StoreError::ItemNotFound(id)),
                Some(from) => Err(StoreError::InvalidTransition {
                    id,
                    from: from.parse()?,
                    to: status,
                }),
            };
        }

        sqlx::query("INSERT INTO download_log (paper_id, status, error_message) VALUES (?, ?, ?)")
            .bind(id)
            .bind(status.as_str())
            .bind(error_message)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!(id, "download status updated");
        Ok(())
    }

    /// Atomically claims the next pending paper with a PDF URL, moving it to
    /// `downloading` and logging the transition.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the update fails.
    #[instrument(skip(self))]
    pub async fn claim_next_pending(&self, filter: &PaperFilter) -> Result<Option<Paper>> {
        let mut tx = self.db.pool().begin().await?;

        let paper = sqlx::query_as::<_, Paper>(
            r"UPDATE papers
              SET download_status = ?, updated_at = datetime('now')
              WHERE id = (
                  SELECT id FROM papers
                  WHERE download_status = ?
                    AND pdf_url IS NOT NULL AND trim(pdf_url) <> ''
                    AND (? IS NULL OR conference = ?)
                    AND (? IS NULL OR year = ?)
                  ORDER BY id ASC
                  LIMIT 1
              )
              RETURNING *",
        )
        .bind(DownloadStatus::Downloading.as_str())
        .bind(DownloadStatus::Pending.as_str())
        .bind(filter.conference.as_deref())
        .bind(filter.conference.as_deref())
        .bind(filter.year)
        .bind(filter.year)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(paper) = &paper {
            sqlx::query("INSERT INTO download_log (paper_id, status) VALUES (?, ?)")
                .bind(paper.id)
                .bind(DownloadStatus::Downloading.as_str())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(paper)
    }

    /// Resets records left in `downloading` by an interrupted run to `pending`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the update fails.
    #[instrument(skip(self))]
    pub async fn requeue_stale_downloads(&self) -> Result<u64> {
        self.move_all(
            DownloadStatus::Downloading,
            DownloadStatus::Pending,
            &PaperFilter::default(),
            Some("requeued after interrupted run"),
        )
        .await
    }

    /// The explicit `failed -> pending` reset. Completed records are never touched.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the update fails.
    #[instrument(skip(self))]
    pub async fn reset_failed(&self, filter: &PaperFilter) -> Result<u64> {
        self.move_all(
            DownloadStatus::Failed,
            DownloadStatus::Pending,
            filter,
            Some("reset for retry"),
        )
        .await
    }

    async fn move_all(
        &self,
        from: DownloadStatus,
        to: DownloadStatus,
        filter: &PaperFilter,
        note: Option<&str>,
    ) -> Result<u64> {
        let mut tx = self.db.pool().begin().await?;

        let ids: Vec<i64> = sqlx::query_scalar(
            r"UPDATE papers
              SET download_status = ?, pdf_path = NULL, updated_at = datetime('now')
              WHERE download_status = ?
                AND (? IS NULL OR conference = ?)
                AND (? IS NULL OR year = ?)
              RETURNING id",
        )
        .bind(to.as_str())
        .bind(from.as_str())
        .bind(filter.conference.as_deref())
        .bind(filter.conference.as_deref())
        .bind(filter.year)
        .bind(filter.year)
        .fetch_all(&mut *tx)
        .await?;

        for id in &ids {
            sqlx::query(
                "INSERT INTO download_log (paper_id, status, error_message) VALUES (?, ?, ?)",
            )
            .bind(id)
            .bind(to.as_str())
            .bind(note)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        let moved = ids.len() as u64;
        debug!(moved, from = %from, to = %to, "bulk status change");
        Ok(moved)
    }

    /// Returns the count of papers in a status.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn count_by_status(&self, status: DownloadStatus) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM papers WHERE download_status = ?")
                .bind(status.as_str())
                .fetch_one(self.db.pool())
                .await?;
        Ok(count)
    }

    /// Returns the download log of one paper, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn download_attempts(&self, paper_id: i64) -> Result<Vec<DownloadAttempt>> {
        let rows = sqlx::query_as::<_, DownloadAttempt>(
            "SELECT * FROM download_log WHERE paper_id = ? ORDER BY id ASC",
        )
        .bind(paper_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows)
    }

    /// Computes aggregate counts for the `stats` command.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if a query fails.
    #[instrument(skip(self))]
    pub async fn statistics(&self) -> Result<StoreStatistics> {
        let pool = self.db.pool();
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM papers")
            .fetch_one(pool)
            .await?;
        let by_conference: Vec<(String, i64)> = sqlx::query_as(
            "SELECT conference, COUNT(*) FROM papers GROUP BY conference ORDER BY conference",
        )
        .fetch_all(pool)
        .await?;
        let by_status: Vec<(String, i64)> = sqlx::query_as(
            "SELECT download_status, COUNT(*) FROM papers GROUP BY download_status ORDER BY download_status",
        )
        .fetch_all(pool)
        .await?;
        let with_abstract: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM papers WHERE abstract IS NOT NULL AND trim(abstract) <> ''",
        )
        .fetch_one(pool)
        .await?;
        let with_pdf_url: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM papers WHERE pdf_url IS NOT NULL AND trim(pdf_url) <> ''",
        )
        .fetch_one(pool)
        .await?;

        Ok(StoreStatistics {
            total,
            by_conference,
            by_status,
            with_abstract,
            with_pdf_url,
        })
    }
}
