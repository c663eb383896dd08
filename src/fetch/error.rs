//! Fetch error type.

use thiserror::Error;

/// Errors reported by [`super::Fetcher`].
///
/// Transport failures and non-2xx responses are retried internally; the
/// caller only ever sees the exhausted outcome and interprets the last
/// observed status (e.g. 404 as "not found").
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Every attempt failed.
    #[error("request to {url} failed after {attempts} attempt(s): {last_error}")]
    Exhausted {
        /// The URL as requested (including query string).
        url: String,
        /// Number of attempts made.
        attempts: u32,
        /// HTTP status of the last response, when one was received.
        last_status: Option<u16>,
        /// Description of the last failure.
        last_error: String,
    },
}

impl FetchError {
    /// Creates an exhausted error.
    #[must_use]
    pub fn exhausted(
        url: impl Into<String>,
        attempts: u32,
        last_status: Option<u16>,
        last_error: impl Into<String>,
    ) -> Self {
        Self::Exhausted {
            url: url.into(),
            attempts,
            last_status,
            last_error: last_error.into(),
        }
    }

    /// HTTP status of the last response, if any.
    #[must_use]
    pub fn last_status(&self) -> Option<u16> {
        match self {
            Self::Exhausted { last_status, .. } => *last_status,
        }
    }

    /// Number of attempts made.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    /// True when the last response was a 404.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.last_status() == Some(404)
    }
}
