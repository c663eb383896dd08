//! Source adapter error types.

use thiserror::Error;

use crate::fetch::FetchError;

/// Errors from crawling an upstream source.
///
/// Item-level problems never surface here; adapters log and skip the
/// offending item. These variants describe a whole task failing.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// The page or query could not be fetched.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The page or query payload as a whole was malformed.
    #[error("malformed {adapter} response: {reason}")]
    Parse {
        /// Adapter that received the payload.
        adapter: String,
        /// What was wrong.
        reason: String,
    },

    /// No catalog entry matches the venue name.
    #[error("unknown venue '{0}' (run `paper-harvest venues` for the list)")]
    UnknownVenue(String),

    /// No adapter is registered for the venue/source combination.
    #[error("no {adapter} adapter registered for {venue}")]
    Unsupported {
        /// Requested adapter name.
        adapter: String,
        /// Venue display name.
        venue: String,
    },
}

impl SourceError {
    /// Creates a payload-level parse error.
    #[must_use]
    pub fn parse(adapter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            adapter: adapter.into(),
            reason: reason.into(),
        }
    }

    /// True for transport-level failures.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Fetch(_))
    }
}
