//! PDF download pipeline.
//!
//! Papers with a resolved `pdf_url` move through a small state machine in
//! the store: `pending -> downloading -> completed | failed`. The
//! [`DownloadEngine`] runs a bounded pool of workers over the pending set;
//! each worker streams one artifact to
//! `<pdf_dir>/<conference>/<year>/<id>_<title>.pdf`.
//!
//! # Features
//!
//! - Idempotent resume: a non-empty file already at the target path is
//!   accepted without a request
//! - Streaming through a `.part` file, renamed only when non-empty
//! - Per-item retry with linear backoff
//! - Per-host request spacing shared by all workers
//! - Cooperative interrupt: no new claims, short grace, unfinished items
//!   return to `pending`

mod client;
mod engine;
mod error;
mod path;
pub mod rate_limiter;

pub use client::{ArtifactClient, is_complete_artifact};
pub use engine::{DEFAULT_WORKERS, DownloadEngine, DownloadStats, MAX_WORKERS, MIN_WORKERS};
pub use error::{DownloadError, EngineError};
pub use path::{MAX_TITLE_BYTES, artifact_path, partial_path, sanitize_title};
pub use rate_limiter::{RateLimiter, extract_host};
