//! Page fetching with rotating client identity and optional backoff.
//!
//! # Architecture
//!
//! - [`PageFetcher`]: the one operation the pipeline needs, `fetch(url) -> html`
//! - [`HttpFetcher`]: `reqwest` over rustls, one sampled `User-Agent` per request
//! - [`RetryFetch`]: decorator adding bounded exponential backoff to any fetcher
//!
//! A fetch that does not produce a 2xx body is a [`FetchError`]. Callers treat
//! that as "skip this page" (or "no description" for detail pages), never as a
//! reason to stop the run.
//!
//! # Retry Strategy
//!
//! Off by default. When enabled, transport errors, HTTP 429 and 5xx responses
//! are retried:
//!
//! ```text
//! delay = min(base_delay * 2^(attempt-1), 30s) + random_jitter(0..250ms)
//! ```

use std::fmt;
use std::time::{Duration, Instant};

use rand::seq::IndexedRandom;
use rand::{Rng, rng};
use reqwest::Client;
use reqwest::header::USER_AGENT;
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};
use url::Url;

use crate::error::{ConfigError, FetchError};

/// Retrieves the raw HTML behind a URL.
pub trait PageFetcher {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError>;
}

/// HTTP fetcher sampling its identity from a fixed pool.
pub struct HttpFetcher {
    client: Client,
    user_agents: Vec<String>,
}

impl HttpFetcher {
    /// Build a client with certificate validation against the bundled root set.
    pub fn new(user_agents: &[String], timeout: Duration) -> Result<Self, ConfigError> {
        let user_agents: Vec<String> = user_agents
            .iter()
            .map(|ua| ua.trim().to_string())
            .filter(|ua| !ua.is_empty())
            .collect();
        if user_agents.is_empty() {
            return Err(ConfigError::Invalid("user_agents pool is empty".to_string()));
        }
        let client = Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::Invalid(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            user_agents,
        })
    }

    fn pick_user_agent(&self) -> &str {
        self.user_agents
            .choose(&mut rng())
            .map(String::as_str)
            .unwrap_or_default()
    }
}

impl fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpFetcher")
            .field("user_agents", &self.user_agents.len())
            .finish()
    }
}

impl PageFetcher for HttpFetcher {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        let t0 = Instant::now();
        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, self.pick_user_agent())
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|source| FetchError::Body {
            url: url.to_string(),
            source,
        })?;
        debug!(
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched page"
        );
        Ok(body)
    }
}

/// Wrapper that retries transient failures of an inner [`PageFetcher`].
pub struct RetryFetch<F> {
    inner: F,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl<F: PageFetcher> RetryFetch<F> {
    /// Wrap `inner` with retry behaviour.
    ///
    /// # Arguments
    ///
    /// * `inner` - The fetcher doing the actual requests
    /// * `max_retries` - Extra attempts after the first; zero means a single attempt
    /// * `base_delay` - Delay before the first retry, doubled for each later one
    ///
    /// # Returns
    ///
    /// A fetcher that retries transport errors, HTTP 429 and 5xx responses, and
    /// backs off with at most 30 seconds between attempts.
    pub fn new(inner: F, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl<F> fmt::Debug for RetryFetch<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

fn is_transient(err: &FetchError) -> bool {
    match err {
        FetchError::Transport { .. } | FetchError::Body { .. } => true,
        FetchError::Status { status, .. } => *status == 429 || *status >= 500,
    }
}

impl<F: PageFetcher> PageFetcher for RetryFetch<F> {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        let mut attempt = 0usize;
        loop {
            match self.inner.fetch(url).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries || !is_transient(&e) {
                        if self.max_retries > 0 {
                            error!(attempt, max = self.max_retries, error = %e, "fetch gave up");
                        }
                        return Err(e);
                    }

                    let exp = u32::try_from(attempt - 1).unwrap_or(u32::MAX).min(16);
                    let mut delay = self.base_delay.saturating_mul(1 << exp);
                    if delay > self.max_delay {
                        delay = self.max_delay;
                    }
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + Duration::from_millis(jitter_ms);

                    warn!(attempt, max = self.max_retries, ?delay, error = %e, "fetch failed; backing off");
                    sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Flaky {
        failures: Cell<usize>,
        status: u16,
        calls: Cell<usize>,
    }

    impl Flaky {
        fn new(failures: usize, status: u16) -> Self {
            Self {
                failures: Cell::new(failures),
                status,
                calls: Cell::new(0),
            }
        }
    }

    impl PageFetcher for Flaky {
        async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
            self.calls.set(self.calls.get() + 1);
            if self.failures.get() > 0 {
                self.failures.set(self.failures.get() - 1);
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: self.status,
                });
            }
            Ok("<html></html>".to_string())
        }
    }

    fn url() -> Url {
        Url::parse("https://example.com/").unwrap()
    }

    #[tokio::test]
    async fn test_zero_retries_is_a_single_attempt() {
        let fetcher = RetryFetch::new(Flaky::new(1, 503), 0, Duration::ZERO);
        assert!(fetcher.fetch(&url()).await.is_err());
        assert_eq!(fetcher.inner.calls.get(), 1);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let fetcher = RetryFetch::new(Flaky::new(2, 503), 3, Duration::ZERO);
        assert_eq!(fetcher.fetch(&url()).await.unwrap(), "<html></html>");
        assert_eq!(fetcher.inner.calls.get(), 3);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let fetcher = RetryFetch::new(Flaky::new(1, 404), 3, Duration::ZERO);
        let err = fetcher.fetch(&url()).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
        assert_eq!(fetcher.inner.calls.get(), 1);
    }

    #[test]
    fn test_user_agent_is_drawn_from_pool() {
        let pool = vec!["agent-a".to_string(), " ".to_string(), "agent-b".to_string()];
        let fetcher = HttpFetcher::new(&pool, Duration::from_secs(5)).unwrap();
        for _ in 0..20 {
            let ua = fetcher.pick_user_agent();
            assert!(ua == "agent-a" || ua == "agent-b");
        }
    }

    /// Answer a single HTTP request with `response` and hand back the raw request.
    async fn serve_once(response: &'static str) -> (Url, tokio::task::JoinHandle<String>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            String::from_utf8_lossy(&request).to_lowercase()
        });
        let url = Url::parse(&format!("http://{addr}/listings")).unwrap();
        (url, handle)
    }

    fn pool() -> Vec<String> {
        vec!["agent-a".to_string(), "agent-b".to_string()]
    }

    #[tokio::test]
    async fn test_http_error_status_is_reported() {
        let (url, server) = serve_once(
            "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;
        let fetcher = HttpFetcher::new(&pool(), Duration::from_secs(5)).unwrap();

        let err = fetcher.fetch(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 503, .. }));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_success_returns_body_and_sends_pool_user_agent() {
        let (url, server) = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: 15\r\nConnection: close\r\n\r\n<html>ok</html>",
        )
        .await;
        let fetcher = HttpFetcher::new(&pool(), Duration::from_secs(5)).unwrap();

        assert_eq!(fetcher.fetch(&url).await.unwrap(), "<html>ok</html>");
        let request = server.await.unwrap();
        assert!(request.starts_with("get /listings http/1.1"));
        assert!(
            request.contains("user-agent: agent-a\r\n")
                || request.contains("user-agent: agent-b\r\n")
        );
    }

    #[tokio::test]
    async fn test_connection_refused_is_a_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let url = Url::parse(&format!("http://{addr}/")).unwrap();
        let fetcher = HttpFetcher::new(&pool(), Duration::from_secs(5)).unwrap();

        let err = fetcher.fetch(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::Transport { .. }));
        assert!(is_transient(&err));
    }

    #[test]
    fn test_empty_pool_is_rejected() {
        assert!(HttpFetcher::new(&[], Duration::from_secs(5)).is_err());
    }
}
