//! HTTP transport abstraction for testability.
//!
//! Manifest fetches and archive downloads both go through [`HttpTransport`].
//! The production implementation wraps an async `reqwest` client; tests use
//! the range-aware [`tests::MockTransport`].

use std::time::Duration;

use bytes::Bytes;
use futures::stream::BoxStream;
use futures_util::StreamExt;

use super::error::{ManagerError, ManagerResult};
use super::traits::BoxFuture;

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("RoseVeilLauncher/", env!("CARGO_PKG_VERSION"));

/// Streaming response body.
pub type BodyStream = BoxStream<'static, ManagerResult<Bytes>>;

/// Response head plus a streaming body.
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Length of this response's body, if the server declared one.
    ///
    /// For a `206 Partial Content` reply this is the length of the
    /// remaining range, not of the whole resource.
    pub content_length: Option<u64>,
    /// Body chunks in arrival order.
    pub body: BodyStream,
}

impl HttpResponse {
    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Collect the whole body into memory.
    pub async fn collect_body(self) -> ManagerResult<Vec<u8>> {
        let mut body = self.body;
        let mut buf = Vec::with_capacity(self.content_length.unwrap_or(0) as usize);
        while let Some(chunk) = body.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf)
    }
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Trait for HTTP GET operations.
///
/// Implementations must not treat non-2xx statuses as errors; callers
/// decide what a status means (a `200` to a range request, for example).
pub trait HttpTransport: Send + Sync {
    /// Issue a GET with the given extra headers.
    fn get<'a>(
        &'a self,
        url: &'a str,
        headers: &'a [(String, String)],
    ) -> BoxFuture<'a, ManagerResult<HttpResponse>>;
}

/// Real HTTP transport using async reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    connect_timeout: Duration,
}

impl ReqwestTransport {
    /// Create a transport with the given connect timeout.
    ///
    /// Whole-request bounds are applied by the callers (manifest fetcher,
    /// downloader) so that large archive transfers are not cut short by
    /// the short manifest timeout.
    pub fn new(connect_timeout: Duration) -> ManagerResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| ManagerError::InvalidConfig(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            connect_timeout,
        })
    }

    /// Wrap an existing client.
    pub fn from_client(client: reqwest::Client, connect_timeout: Duration) -> Self {
        Self {
            client,
            connect_timeout,
        }
    }

    fn classify(url: &str, timeout: Duration, err: reqwest::Error) -> ManagerError {
        if err.is_timeout() {
            ManagerError::Timeout {
                url: url.to_string(),
                timeout_secs: timeout.as_secs(),
            }
        } else {
            ManagerError::Network {
                url: url.to_string(),
                reason: err.to_string(),
            }
        }
    }
}

impl HttpTransport for ReqwestTransport {
    fn get<'a>(
        &'a self,
        url: &'a str,
        headers: &'a [(String, String)],
    ) -> BoxFuture<'a, ManagerResult<HttpResponse>> {
        Box::pin(async move {
            let mut request = self.client.get(url);
            for (name, value) in headers {
                request = request.header(name.as_str(), value.as_str());
            }

            let response = request
                .send()
                .await
                .map_err(|e| Self::classify(url, self.connect_timeout, e))?;

            let status = response.status().as_u16();
            let content_length = response.content_length();
            let owned_url = url.to_string();
            let timeout = self.connect_timeout;
            let body = response
                .bytes_stream()
                .map(move |chunk| chunk.map_err(|e| Self::classify(&owned_url, timeout, e)))
                .boxed();

            Ok(HttpResponse {
                status,
                content_length,
                body,
            })
        })
    }
}
