//! Paper Harvest Core Library
//!
//! Collects bibliographic metadata for conference papers from several
//! upstreams, normalizes it into one record shape, stores it idempotently,
//! and downloads the PDF artifacts with bounded concurrency.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`fetch`] - HTTP fetcher with bounded retries and linear backoff
//! - [`sources`] - Source adapters (DBLP, IACR program feeds, venue listings,
//!   Semantic Scholar) and the venue catalog
//! - [`store`] - `SQLite`-backed paper store with the download audit log
//! - [`ingest`] - Coordinator driving adapters over (source, venue, year) tasks
//! - [`download`] - Worker pool streaming artifacts to disk
//! - [`enrich`] - Sequential pass filling missing abstracts
//! - [`db`] - Database connection and schema management

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod db;
pub mod download;
pub mod enrich;
pub mod fetch;
pub mod ingest;
pub mod sources;
pub mod store;
pub mod user_agent;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use db::{Database, DbError};
pub use download::{
    ArtifactClient, DEFAULT_WORKERS, DownloadEngine, DownloadError, DownloadStats, EngineError,
    RateLimiter,
};
pub use enrich::{EnrichStats, EnrichmentPass};
pub use fetch::{FetchConfig, FetchError, Fetcher, RetryPolicy};
pub use ingest::{IngestCoordinator, IngestReport, SourceTask, TaskState};
pub use sources::{
    AdapterRegistry, EnrichmentSource, SourceAdapter, SourceError, SourceKind, Venue,
    build_default_registry, find_venue,
};
pub use store::{
    DownloadStatus, NewPaper, Paper, PaperFilter, PaperPatch, PaperRepository, PaperStore,
    StoreError,
};
