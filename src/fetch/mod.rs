//! HTTP fetcher with bounded retries.
//!
//! The fetcher is the only component that talks to metadata upstreams. Every
//! non-2xx response and every transport error is retried with linear backoff
//! until the attempt budget is spent, then reported as
//! [`FetchError::Exhausted`].
//!
//! # Example
//!
//! ```no_run
//! use paper_harvest::fetch::{FetchConfig, Fetcher};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = Fetcher::new(&FetchConfig::default())?;
//! let body = fetcher
//!     .get_text("https://dblp.org/search/publ/api", &[("q", "conf/crypto 2024"), ("format", "json")])
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod retry;

pub use error::FetchError;
pub use retry::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY, RetryDecision, RetryPolicy};

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, Method, Response};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::user_agent;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connect timeout applied to every client.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Fetcher settings.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Whole-request timeout.
    pub timeout: Duration,
    /// Maximum attempts per request (including the first).
    pub retry_times: u32,
    /// Backoff unit; attempt `n` failing waits `retry_delay * n`.
    pub retry_delay: Duration,
    /// User-Agent header sent with every request.
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            retry_times: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            user_agent: user_agent::default_user_agent().to_string(),
        }
    }
}

/// Failure of a single attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFailure {
    /// Response status, when a response arrived.
    pub status: Option<u16>,
    /// Description of the failure.
    pub message: String,
}

impl AttemptFailure {
    fn transport(error: &reqwest::Error) -> Self {
        let message = if error.is_timeout() {
            "request timed out".to_string()
        } else {
            error.to_string()
        };
        Self {
            status: None,
            message,
        }
    }
}

/// Retrying HTTP client.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    policy: RetryPolicy,
}

impl Fetcher {
    /// Builds a fetcher from settings.
    ///
    /// # Errors
    ///
    /// Returns the `reqwest` builder error if the client cannot be created
    /// (e.g. TLS backend initialization failure).
    pub fn new(config: &FetchConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(config.timeout))
            .timeout(config.timeout)
            .gzip(true)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            policy: RetryPolicy::new(config.retry_times, config.retry_delay),
        })
    }

    /// Returns the retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Sends `method url?params` until a 2xx response arrives or attempts run out.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Exhausted`] once every attempt failed; an
    /// unparseable URL is exhausted immediately with zero attempts.
    #[instrument(skip(self, params), fields(url = %url, method = %method))]
    pub async fn fetch(
        &self,
        url: &str,
        method: Method,
        params: &[(&str, &str)],
    ) -> Result<Response, FetchError> {
        let target = build_url(url, params)?;
        let target_ref = &target;
        self.with_retries(target_ref, move || self.attempt(method.clone(), target_ref))
            .await
    }

    /// GETs `url?params` and returns the body text; body read failures are retried too.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Exhausted`] once every attempt failed.
    #[instrument(skip(self, params), fields(url = %url))]
    pub async fn get_text(&self, url: &str, params: &[(&str, &str)]) -> Result<String, FetchError> {
        let target = build_url(url, params)?;
        let target_ref = &target;
        self.with_retries(target_ref, move || async move {
            let response = self.attempt(Method::GET, target_ref).await?;
            response
                .text()
                .await
                .map_err(|e| AttemptFailure::transport(&e))
        })
        .await
    }

    /// Sends one request without retrying; non-2xx statuses are failures.
    ///
    /// # Errors
    ///
    /// Returns an [`AttemptFailure`] for transport errors and non-2xx statuses.
    pub async fn attempt(&self, method: Method, url: &Url) -> Result<Response, AttemptFailure> {
        let response = self
            .client
            .request(method, url.clone())
            .send()
            .await
            .map_err(|e| AttemptFailure::transport(&e))?;

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(AttemptFailure {
                status: Some(status.as_u16()),
                message: format!("HTTP {}", status.as_u16()),
            })
        }
    }

    async fn with_retries<T, F, Fut>(&self, url: &Url, mut op: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AttemptFailure>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => {
                    debug!(attempt, "request succeeded");
                    return Ok(value);
                }
                Err(failure) => {
                    warn!(
                        url = %url,
                        attempt,
                        max_attempts = self.policy.max_attempts(),
                        error = %failure.message,
                        "request attempt failed"
                    );
                    match self.policy.should_retry(attempt) {
                        RetryDecision::Retry {
                            delay,
                            attempt: next,
                        } => {
                            tokio::time::sleep(delay).await;
                            attempt = next;
                        }
                        RetryDecision::DoNotRetry { .. } => {
                            return Err(FetchError::exhausted(
                                url.as_str(),
                                attempt,
                                failure.status,
                                failure.message,
                            ));
                        }
                    }
                }
            }
        }
    }
}

fn build_url(url: &str, params: &[(&str, &str)]) -> Result<Url, FetchError> {
    let mut parsed =
        Url::parse(url).map_err(|e| FetchError::exhausted(url, 0, None, format!("invalid URL: {e}")))?;
    if !params.is_empty() {
        parsed.query_pairs_mut().extend_pairs(params.iter().copied());
    }
    Ok(parsed)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, ResponseTemplate};

    fn fast_config(retry_times: u32) -> FetchConfig {
        FetchConfig {
            timeout: Duration::from_secs(5),
            retry_times,
            retry_delay: Duration::from_millis(1),
            user_agent: "paper-harvest-test".to_string(),
        }
    }

    #[test]
    fn test_build_url_appends_params() {
        let url = build_url("https://dblp.org/search/publ/api", &[("q", "conf/crypto 2024")])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://dblp.org/search/publ/api?q=conf%2Fcrypto+2024"
        );
    }

    #[test]
    fn test_build_url_without_params_has_no_query() {
        let url = build_url("https://example.com/a", &[]).unwrap();
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_invalid_url_is_exhausted_without_attempts() {
        let fetcher = Fetcher::new(&fast_config(3)).unwrap();
        let err = tokio_test::block_on(fetcher.get_text("not a url", &[])).unwrap_err();
        assert_eq!(err.attempts(), 0);
    }

    #[tokio::test]
    async fn test_fetch_success_first_attempt() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/api"))
            .and(query_param("format", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&fast_config(3)).unwrap();
        let body = fetcher
            .get_text(&format!("{}/api", server.uri()), &[("format", "json")])
            .await
            .unwrap();
        assert_eq!(body, "{}");
    }

    #[tokio::test]
    async fn test_fetch_exhausts_after_configured_attempts() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&fast_config(3)).unwrap();
        let err = fetcher
            .fetch(&format!("{}/down", server.uri()), Method::GET, &[])
            .await
            .unwrap_err();

        assert_eq!(err.attempts(), 3);
        assert_eq!(err.last_status(), Some(503));
    }

    #[tokio::test]
    async fn test_fetch_404_is_retried_like_any_failure() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(2)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&fast_config(2)).unwrap();
        let err = fetcher
            .fetch(&server.uri(), Method::GET, &[])
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_fetch_recovers_after_transient_failure() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&fast_config(3)).unwrap();
        let body = fetcher.get_text(&server.uri(), &[]).await.unwrap();
        assert_eq!(body, "ok");
    }
}
