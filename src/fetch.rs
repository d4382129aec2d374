//! HTTP fetch layer with exponential backoff.
//!
//! This is a pure transport primitive: no caching, no parsing. A fetch is a
//! GET that either yields the response body or a [`FetchError`] once every
//! attempt is spent. The caller decides what a terminal failure means
//! (typically: skip the city this cycle, fall back to stored state).
//!
//! # Retry Strategy
//!
//! - A fixed number of attempts (default 3)
//! - Delay between attempts of `backoff_base * 2^(attempt-1)`
//! - No jitter, so the worst-case wait for a key is predictable
//! - A user agent drawn at random from a fixed pool on every attempt, so
//!   retries do not present a uniform signature to the remote site

use crate::error::{FetchCause, FetchError};
use rand::seq::IndexedRandom;
use reqwest::Client;
use reqwest::header::USER_AGENT;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

/// Browser user-agent pool; one entry is picked per attempt.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
];

/// Default attempt budget per URL.
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;
/// Default backoff base; doubles after each failed attempt.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(1);

/// A single HTTP GET attempt.
///
/// Seam between the retry policy and the actual transport, so the policy can
/// wrap any underlying client.
pub trait FetchOnce {
    async fn get(&self, url: &str) -> Result<String, FetchCause>;
}

/// reqwest-backed single-attempt fetcher.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl FetchOnce for HttpFetcher {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn get(&self, url: &str) -> Result<String, FetchCause> {
        let agent = USER_AGENTS
            .choose(&mut rand::rng())
            .copied()
            .unwrap_or(USER_AGENTS[0]);
        debug!(user_agent = agent, "issuing GET");

        let response = self.client.get(url).header(USER_AGENT, agent).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchCause::Status(status));
        }
        Ok(response.text().await?)
    }
}

/// Adds exponential backoff retries to any [`FetchOnce`] implementation.
///
/// Makes at most `max_attempts` tries, sleeping `backoff_base * 2^(attempt-1)`
/// between them. Delays are deliberately not jittered.
#[derive(Debug)]
pub struct RetryFetch<T> {
    inner: T,
    max_attempts: usize,
    backoff_base: Duration,
}

impl<T> RetryFetch<T>
where
    T: FetchOnce,
{
    pub fn new(inner: T, max_attempts: usize, backoff_base: Duration) -> Self {
        Self {
            inner,
            // Zero attempts would mean never touching the network at all.
            max_attempts: max_attempts.max(1),
            backoff_base,
        }
    }

    /// Fetch `url`, retrying until the attempt budget runs out.
    #[instrument(level = "info", skip_all, fields(%url))]
    pub async fn get(&self, url: &str) -> Result<String, FetchError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            attempt += 1;
            let attempt_t0 = Instant::now();
            match self.inner.get(url).await {
                Ok(body) => {
                    debug!(
                        attempt,
                        bytes = body.len(),
                        elapsed_ms = attempt_t0.elapsed().as_millis() as u64,
                        "fetch succeeded"
                    );
                    return Ok(body);
                }
                Err(cause) => {
                    if attempt >= self.max_attempts {
                        error!(
                            attempt,
                            max = self.max_attempts,
                            elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                            error = %cause,
                            "fetch exhausted attempts"
                        );
                        return Err(FetchError {
                            url: url.to_string(),
                            attempts: attempt,
                            last_cause: cause,
                        });
                    }

                    let exponent = u32::try_from(attempt - 1).unwrap_or(31).min(31);
                    let delay = self.backoff_base.saturating_mul(1 << exponent);
                    warn!(
                        attempt,
                        max = self.max_attempts,
                        ?delay,
                        error = %cause,
                        "fetch attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// The fetcher used by the live pipeline.
pub type Fetcher = RetryFetch<HttpFetcher>;

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{any, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(max_attempts: usize, backoff_ms: u64) -> Fetcher {
        RetryFetch::new(
            HttpFetcher::new(Duration::from_secs(5)).unwrap(),
            max_attempts,
            Duration::from_millis(backoff_ms),
        )
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movies/pune"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let body = fetcher(3, 10)
            .get(&format!("{}/movies/pune", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "<html>ok</html>");
    }

    #[tokio::test]
    async fn test_exhausts_exactly_max_attempts_on_persistent_503() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let t0 = Instant::now();
        let err = fetcher(3, 25).get(&server.uri()).await.unwrap_err();
        let elapsed = t0.elapsed();

        assert_eq!(err.attempts, 3);
        assert!(matches!(err.last_cause, FetchCause::Status(s) if s.as_u16() == 503));
        // Two sleeps between three attempts: 25ms + 50ms.
        assert!(elapsed >= Duration::from_millis(75), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(2), "elapsed {elapsed:?}");
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
            .expect(1)
            .mount(&server)
            .await;

        let body = fetcher(3, 5).get(&server.uri()).await.unwrap();
        assert_eq!(body, "recovered");
    }

    #[tokio::test]
    async fn test_user_agent_comes_from_pool() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        fetcher(1, 5).get(&server.uri()).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let sent = requests[0]
            .headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .unwrap();
        assert!(USER_AGENTS.contains(&sent), "unexpected user agent {sent}");
    }

    #[tokio::test]
    async fn test_zero_attempt_budget_is_clamped_to_one() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let err = fetcher(0, 5).get(&server.uri()).await.unwrap_err();
        assert_eq!(err.attempts, 1);
    }
}
