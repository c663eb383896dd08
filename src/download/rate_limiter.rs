//! Per-host spacing of download requests.
//!
//! Workers run concurrently, but two requests to the same host are always
//! at least `delay` apart. Requests to different hosts do not wait on each
//! other.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use paper_harvest::download::RateLimiter;
//!
//! # async fn example() {
//! let limiter = Arc::new(RateLimiter::new(Duration::from_millis(500)));
//!
//! // First request proceeds immediately
//! limiter.acquire("https://eprint.iacr.org/2024/001.pdf").await;
//!
//! // Second request to the same host waits for the delay
//! limiter.acquire("https://eprint.iacr.org/2024/002.pdf").await;
//!
//! // Another host proceeds immediately
//! limiter.acquire("https://www.usenix.org/system/files/x.pdf").await;
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

/// Cumulative wait per host after which a warning is logged.
const CUMULATIVE_DELAY_WARNING_THRESHOLD: Duration = Duration::from_secs(30);

/// Per-host rate limiter shared by all download workers.
#[derive(Debug)]
pub struct RateLimiter {
    delay: Duration,
    disabled: bool,
    /// `Arc` so the shard lock is released before awaiting the inner mutex.
    hosts: DashMap<String, Arc<HostState>>,
}

#[derive(Debug)]
struct HostState {
    /// `None` until the first request; the first request never waits.
    last_request: Mutex<Option<Instant>>,
    cumulative_delay_ms: AtomicU64,
}

impl HostState {
    fn new() -> Self {
        Self {
            last_request: Mutex::new(None),
            cumulative_delay_ms: AtomicU64::new(0),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn add_cumulative_delay(&self, delay: Duration) -> Duration {
        let delay_ms = delay.as_millis() as u64;
        let total = self
            .cumulative_delay_ms
            .fetch_add(delay_ms, Ordering::SeqCst)
            + delay_ms;
        Duration::from_millis(total)
    }
}

impl RateLimiter {
    /// Creates a limiter spacing same-host requests by `delay`.
    ///
    /// A zero delay behaves like [`RateLimiter::disabled`].
    #[must_use]
    #[instrument(skip_all, fields(delay_ms = delay.as_millis()))]
    pub fn new(delay: Duration) -> Self {
        debug!("creating rate limiter");
        Self {
            delay,
            disabled: delay.is_zero(),
            hosts: DashMap::new(),
        }
    }

    /// Creates a limiter that never waits.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Returns whether rate limiting is disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Returns the configured delay.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Waits until a request to `url`'s host may be issued, then records it.
    #[instrument(skip(self), fields(host))]
    pub async fn acquire(&self, url: &str) {
        if self.disabled {
            return;
        }

        let host = extract_host(url);
        tracing::Span::current().record("host", &host);

        let state = self
            .hosts
            .entry(host.clone())
            .or_insert_with(|| Arc::new(HostState::new()))
            .clone();

        let mut last_request = state.last_request.lock().await;
        if let Some(previous) = *last_request {
            let elapsed = previous.elapsed();
            if elapsed < self.delay {
                let wait = self.delay.saturating_sub(elapsed);
                let cumulative = state.add_cumulative_delay(wait);
                debug!(
                    host = %host,
                    delay_ms = wait.as_millis(),
                    cumulative_ms = cumulative.as_millis(),
                    "spacing request to host"
                );
                if cumulative >= CUMULATIVE_DELAY_WARNING_THRESHOLD {
                    warn!(
                        host = %host,
                        cumulative_delay_secs = cumulative.as_secs(),
                        "many artifacts queued on one host; downloads are being throttled"
                    );
                }
                tokio::time::sleep(wait).await;
            }
        }
        *last_request = Some(Instant::now());
    }
}

/// Lowercased host of `url`, or `"unknown"` when it has none.
///
/// # Examples
///
/// ```
/// use paper_harvest::download::extract_host;
///
/// assert_eq!(extract_host("https://ePrint.IACR.org/2024/1.pdf"), "eprint.iacr.org");
/// assert_eq!(extract_host("not a url"), "unknown");
/// ```
#[must_use]
pub fn extract_host(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_request_to_host_is_immediate() {
        let limiter = RateLimiter::new(Duration::from_secs(5));
        let start = Instant::now();
        limiter.acquire("https://a.org/1.pdf").await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_same_host_waits_for_delay() {
        let limiter = RateLimiter::new(Duration::from_millis(100));
        limiter.acquire("https://a.org/1.pdf").await;
        limiter.acquire("https://a.org/2.pdf").await;
        let start = Instant::now();
        limiter.acquire("https://a.org/3.pdf").await;
        assert!(start.elapsed() >= Duration::from_millis(90));
    }

    #[tokio::test]
    async fn test_different_hosts_do_not_wait() {
        let limiter = RateLimiter::new(Duration::from_secs(5));
        limiter.acquire("https://a.org/1.pdf").await;
        let start = Instant::now();
        limiter.acquire("https://b.org/1.pdf").await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_concurrent_same_host_requests_are_serialized() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(50)));
        let start = Instant::now();
        let mut handles = Vec::new();
        for i in 0..3 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                limiter.acquire(&format!("https://a.org/{i}.pdf")).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert!(start.elapsed() >= Duration::from_millis(95));
    }

    #[test]
    fn test_zero_delay_is_disabled() {
        assert!(RateLimiter::new(Duration::ZERO).is_disabled());
        assert!(RateLimiter::disabled().is_disabled());
        assert!(!RateLimiter::new(Duration::from_millis(1)).is_disabled());
    }

    #[test]
    fn test_extract_host_ignores_port() {
        assert_eq!(extract_host("http://127.0.0.1:8080/x.pdf"), "127.0.0.1");
    }
}
