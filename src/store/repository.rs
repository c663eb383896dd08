//! Repository seam for paper persistence.
//!
//! The ingest coordinator, download engine and enrichment pass depend on
//! this trait rather than on [`PaperStore`] directly.

use async_trait::async_trait;

use super::{
    DownloadStatus, NewPaper, Paper, PaperFilter, PaperPatch, PaperStore, Result, StoreStatistics,
};

/// Data-access contract for paper records.
#[async_trait]
pub trait PaperRepository: Send + Sync {
    /// Inserts a new record; duplicates fail with `AlreadyExists`.
    async fn insert(&self, paper: &NewPaper) -> Result<i64>;

    /// Merges a partial update into a record.
    async fn update(&self, id: i64, patch: &PaperPatch) -> Result<()>;

    /// Fetches one record.
    async fn get(&self, id: i64) -> Result<Option<Paper>>;

    /// Lists records matching a filter.
    async fn query(&self, filter: &PaperFilter) -> Result<Vec<Paper>>;

    /// Applies a legal status transition and logs it.
    async fn set_download_status(
        &self,
        id: i64,
        status: DownloadStatus,
        pdf_path: Option<&str>,
        error_message: Option<&str>,
    ) -> Result<()>;

    /// Claims the next pending record with a PDF URL.
    async fn claim_next_pending(&self, filter: &PaperFilter) -> Result<Option<Paper>>;

    /// Aggregate counts.
    async fn statistics(&self) -> Result<StoreStatistics>;
}

#[async_trait]
impl PaperRepository for PaperStore {
    async fn insert(&self, paper: &NewPaper) -> Result<i64> {
        PaperStore::insert(self, paper).await
    }

    async fn update(&self, id: i64, patch: &PaperPatch) -> Result<()> {
        PaperStore::update(self, id, patch).await
    }

    async fn get(&self, id: i64) -> Result<Option<Paper>> {
        PaperStore::get(self, id).await
    }

    async fn query(&self, filter: &PaperFilter) -> Result<Vec<Paper>> {
        PaperStore::query(self, filter).await
    }

    async fn set_download_status(
        &self,
        id: i64,
        status: DownloadStatus,
        pdf_path: Option<&str>,
        error_message: Option<&str>,
    ) -> Result<()> {
        PaperStore::set_download_status(self, id, status, pdf_path, error_message).await
    }

    async fn claim_next_pending(&self, filter: &PaperFilter) -> Result<Option<Paper>> {
        PaperStore::claim_next_pending(self, filter).await
    }

    async fn statistics(&self) -> Result<StoreStatistics> {
        PaperStore::statistics(self).await
    }
}
