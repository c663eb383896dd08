//! Linear backoff retry policy shared by the fetcher and the download engine.
//!
//! Every failure is retryable until the attempt budget is spent. The delay
//! before attempt `n + 1` is `base_delay * n`.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use paper_harvest::fetch::{RetryDecision, RetryPolicy};
//!
//! let policy = RetryPolicy::new(3, Duration::from_secs(2));
//! assert_eq!(
//!     policy.should_retry(1),
//!     RetryDecision::Retry { delay: Duration::from_secs(2), attempt: 2 }
//! );
//! ```

use std::time::Duration;

use tracing::{debug, instrument};

/// Default maximum attempts (including the first one).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default backoff unit.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Decision on whether to retry a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Number of the next attempt (1-indexed).
        attempt: u32,
    },

    /// Give up.
    DoNotRetry {
        /// Human-readable reason.
        reason: String,
    },
}

/// Retry configuration with linear backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy; `max_attempts` is clamped to at least 1.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Decides what to do after `attempt` (1-indexed) failed.
    #[instrument(level = "debug", skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, attempt: u32) -> RetryDecision {
        if attempt >= self.max_attempts {
            debug!(attempt, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        let delay = self.base_delay.saturating_mul(attempt);
        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            "will retry"
        );
        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }
}
