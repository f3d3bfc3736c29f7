//! Manifest fetching with bounded retries.
//!
//! A fetch is one GET bounded by the request timeout. Connection failures,
//! timeouts and non-2xx statuses are retried with linear backoff
//! (`attempt * retry_delay`). A body that cannot be parsed fails at once:
//! the server answered, and asking again rarely changes what it says.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::error::{ManagerError, ManagerResult};
use super::http::HttpTransport;
use crate::package::{parse_tolerant_bytes, Manifest};

/// Default number of attempts per fetch.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default backoff step between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Default bound on a single request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(12);

/// Fetches and tolerantly parses small JSON documents.
#[derive(Clone)]
pub struct ManifestFetcher {
    transport: Arc<dyn HttpTransport>,
    max_attempts: u32,
    retry_delay: Duration,
    request_timeout: Duration,
    headers: Vec<(String, String)>,
}

impl ManifestFetcher {
    /// Create a fetcher with default retry settings.
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            headers: Vec::new(),
        }
    }

    /// Set the number of attempts (at least 1).
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the backoff step.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Add a header sent with every request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Fetch and parse a [`Manifest`].
    pub async fn fetch(&self, url: &str) -> ManagerResult<Manifest> {
        let manifest: Manifest = self.fetch_json(url).await?;
        debug!(url, version = %manifest.version, "manifest fetched");
        Ok(manifest)
    }

    /// Fetch and parse any JSON document with the retry policy.
    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> ManagerResult<T> {
        if url.trim().is_empty() {
            return Err(ManagerError::InvalidConfig(
                "manifest URL is not configured".to_string(),
            ));
        }

        let mut last_error = None;
        for attempt in 1..=self.max_attempts {
            match self.fetch_once(url).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() => {
                    warn!(url, attempt, max_attempts = self.max_attempts, error = %e, "manifest fetch failed");
                    last_error = Some(e);
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.retry_delay * attempt).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(ManagerError::ManifestFetch {
            url: url.to_string(),
            attempts: self.max_attempts,
            reason: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no attempts made".to_string()),
        })
    }

    async fn fetch_once<T: DeserializeOwned>(&self, url: &str) -> ManagerResult<T> {
        let request = async {
            let response = self.transport.get(url, &self.headers).await?;
            if !response.is_success() {
                return Err(ManagerError::HttpStatus {
                    url: url.to_string(),
                    status: response.status,
                });
            }
            response.collect_body().await
        };

        let body = tokio::time::timeout(self.request_timeout, request)
            .await
            .map_err(|_| ManagerError::Timeout {
                url: url.to_string(),
                timeout_secs: self.request_timeout.as_secs(),
            })??;

        parse_tolerant_bytes(&body).map_err(|e| ManagerError::ManifestParse {
            url: url.to_string(),
            reason: e.reason,
            snippet: e.snippet,
        })
    }
}

impl std::fmt::Debug for ManifestFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManifestFetcher")
            .field("max_attempts", &self.max_attempts)
            .field("retry_delay", &self.retry_delay)
            .field("request_timeout", &self.request_timeout)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::http::tests::{MockFailure, MockTransport};

    const URL: &str = "https://cdn.example.com/manifest.json";

    fn fetcher(mock: &Arc<MockTransport>) -> ManifestFetcher {
        ManifestFetcher::new(Arc::clone(mock) as Arc<dyn HttpTransport>)
            .with_retry_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_fetch_manifest() {
        let mock = Arc::new(MockTransport::new());
        mock.serve(
            URL,
            r#"{"version":"1.0.1","url":"https://cdn.example.com/p.zip","sha256":"aa11"}"#,
        );

        let manifest = fetcher(&mock).fetch(URL).await.unwrap();
        assert_eq!(manifest.version, "1.0.1");
        assert_eq!(manifest.sha256.as_deref(), Some("aa11"));
    }

    #[tokio::test]
    async fn test_wrapped_body_parses() {
        let mock = Arc::new(MockTransport::new());
        mock.serve(
            URL,
            "\u{feff}<!-- cached -->{\"version\":\"2\",\"url\":\"u\"}\n<!-- 0.02s -->",
        );

        let manifest = fetcher(&mock).fetch(URL).await.unwrap();
        assert_eq!(manifest.version, "2");
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let mock = Arc::new(MockTransport::new());
        mock.serve(URL, r#"{"version":"3","url":"u"}"#);
        mock.fail_next(URL, MockFailure::Connect);
        mock.fail_next(URL, MockFailure::Status(503));

        let manifest = fetcher(&mock).fetch(URL).await.unwrap();
        assert_eq!(manifest.version, "3");
        assert_eq!(mock.request_count(URL), 3);
    }

    #[tokio::test]
    async fn test_exhausted_attempts() {
        let mock = Arc::new(MockTransport::new());

        let result = fetcher(&mock).with_max_attempts(2).fetch(URL).await;
        match result {
            Err(ManagerError::ManifestFetch {
                attempts, reason, ..
            }) => {
                assert_eq!(attempts, 2);
                assert!(reason.contains("404"));
            }
            other => panic!("Expected ManifestFetch, got {other:?}"),
        }
        assert_eq!(mock.request_count(URL), 2);
    }

    #[tokio::test]
    async fn test_parse_error_is_not_retried() {
        let mock = Arc::new(MockTransport::new());
        mock.serve(URL, "<html>maintenance</html>");

        let result = fetcher(&mock).fetch(URL).await;
        match result {
            Err(ManagerError::ManifestParse { url, snippet, .. }) => {
                assert_eq!(url, URL);
                assert!(snippet.contains("maintenance"));
            }
            other => panic!("Expected ManifestParse, got {other:?}"),
        }
        assert_eq!(mock.request_count(URL), 1);
    }

    #[tokio::test]
    async fn test_headers_are_sent() {
        let mock = Arc::new(MockTransport::new());
        mock.serve(URL, r#"{"version":"1","url":"u"}"#);

        fetcher(&mock)
            .with_header("Accept", "application/json")
            .fetch(URL)
            .await
            .unwrap();

        let requests = mock.requests();
        assert_eq!(requests[0].header("accept"), Some("application/json"));
    }

    #[tokio::test]
    async fn test_empty_url_is_config_error() {
        let mock = Arc::new(MockTransport::new());
        let result = fetcher(&mock).fetch("  ").await;
        assert!(matches!(result, Err(ManagerError::InvalidConfig(_))));
        assert!(mock.requests().is_empty());
    }
}
