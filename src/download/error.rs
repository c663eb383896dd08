//! Error types for the download pipeline.

use std::path::PathBuf;

use thiserror::Error;

use crate::store::StoreError;

use super::engine::{MAX_WORKERS, MIN_WORKERS};

/// Errors from downloading one artifact.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Non-2xx response.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Transport failure (DNS, connect, TLS, timeout, body read).
    #[error("network error downloading {url}: {reason}")]
    Network {
        /// The URL being downloaded.
        url: String,
        /// Description of the failure.
        reason: String,
    },

    /// File system error while writing the artifact.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The server answered 2xx with no body.
    #[error("empty response body from {url}")]
    EmptyBody {
        /// The URL being downloaded.
        url: String,
    },

    /// The run was interrupted before the download finished.
    #[error("download of {url} cancelled")]
    Cancelled {
        /// The URL being downloaded.
        url: String,
    },

    /// The stored `pdf_url` is not a valid URL.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },
}

impl DownloadError {
    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a network error.
    pub fn network(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an empty-body error.
    pub fn empty_body(url: impl Into<String>) -> Self {
        Self::EmptyBody { url: url.into() }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// True when another attempt could succeed.
    ///
    /// Upstream failures are retried; local and input errors are not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::HttpStatus { .. } | Self::Network { .. } | Self::EmptyBody { .. }
        )
    }
}

/// Errors that stop the download pool as a whole.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Worker count outside the accepted range.
    #[error("invalid worker count {value}: must be between {MIN_WORKERS} and {MAX_WORKERS}")]
    InvalidConcurrency {
        /// The rejected value.
        value: usize,
    },

    /// Claiming work from the store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}
