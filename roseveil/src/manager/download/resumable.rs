//! HTTP downloader with resume support.
//!
//! Transfers stream into `<dest>.part` and are renamed onto `dest` only after
//! the whole body has arrived:
//! - an existing partial file is continued with `Range: bytes=<len>-`
//! - a `200` reply to a range request discards the partial file and restarts
//! - a `416` reply to a range request discards the partial file and retries once from zero
//! - a dropped connection is re-requested from the new partial length, up to
//!   the configured number of attempts, within the same call
//! - reported progress never decreases within a call, even across a restart
//! - failures and timeouts leave the partial file on disk for a later call

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::progress::{DownloadProgress, ProgressCallback};
use super::state::{DownloadOutcome, TransferState};
use crate::manager::error::{ManagerError, ManagerResult};
use crate::manager::http::{BodyStream, HttpResponse, HttpTransport};

/// Default bound on a whole transfer in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 1800; // 30 minutes

/// Default number of requests one call may issue after dropped connections.
const DEFAULT_RESUME_ATTEMPTS: u32 = 3;

/// Resumable, digesting downloader.
pub struct ResumableDownloader {
    transport: Arc<dyn HttpTransport>,
    pub(crate) timeout: Duration,
    resume_attempts: u32,
}

impl ResumableDownloader {
    /// Create a downloader with default settings.
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            resume_attempts: DEFAULT_RESUME_ATTEMPTS,
        }
    }

    /// Bound the whole transfer (all attempts) by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set how many requests one call may issue. `1` disables in-call resumption.
    pub fn with_resume_attempts(mut self, attempts: u32) -> Self {
        self.resume_attempts = attempts.max(1);
        self
    }

    /// Download `url` to `dest`, reporting progress per chunk.
    pub async fn download(
        &self,
        url: &str,
        dest: &Path,
        progress: Option<ProgressCallback<'_>>,
    ) -> ManagerResult<DownloadOutcome> {
        self.download_with_cancel(url, dest, progress, None).await
    }

    /// Download with an abort signal checked while waiting for each chunk.
    pub async fn download_with_cancel(
        &self,
        url: &str,
        dest: &Path,
        progress: Option<ProgressCallback<'_>>,
        cancel: Option<&CancellationToken>,
    ) -> ManagerResult<DownloadOutcome> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ManagerError::CreateDirFailed {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        let transfer = self.download_with_resume(url, dest, progress, cancel);
        match tokio::time::timeout(self.timeout, transfer).await {
            Ok(result) => result,
            Err(_) => {
                warn!(url, timeout_secs = self.timeout.as_secs(), "download timed out, partial file kept");
                Err(ManagerError::Timeout {
                    url: url.to_string(),
                    timeout_secs: self.timeout.as_secs(),
                })
            }
        }
    }

    async fn download_with_resume(
        &self,
        url: &str,
        dest: &Path,
        progress: Option<ProgressCallback<'_>>,
        cancel: Option<&CancellationToken>,
    ) -> ManagerResult<DownloadOutcome> {
        // A re-request answered with 200 starts over from zero; hold reports
        // back until the new attempt passes what was already shown.
        let high_water = AtomicU64::new(0);
        let monotonic = |p: &DownloadProgress| {
            if p.downloaded < high_water.load(Ordering::Relaxed) {
                return;
            }
            high_water.store(p.downloaded, Ordering::Relaxed);
            if let Some(cb) = progress {
                cb(p);
            }
        };
        let progress: Option<ProgressCallback<'_>> =
            progress.map(|_| &monotonic as ProgressCallback<'_>);

        let mut attempt = 1;
        loop {
            match self.transfer_once(url, dest, progress, cancel).await {
                Ok(outcome) => {
                    info!(
                        url,
                        path = %dest.display(),
                        bytes = outcome.bytes_written,
                        sha256 = %outcome.sha256,
                        "download complete"
                    );
                    return Ok(outcome);
                }
                Err(ManagerError::Network { reason, .. }) if attempt < self.resume_attempts => {
                    warn!(url, attempt, %reason, "transfer interrupted, resuming from partial file");
                    attempt += 1;
                }
                Err(ManagerError::Network { reason, .. }) => {
                    return Err(ManagerError::DownloadFailed {
                        url: url.to_string(),
                        reason,
                    })
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One request: inspect the partial file, fetch, stream, rename.
    async fn transfer_once(
        &self,
        url: &str,
        dest: &Path,
        progress: Option<ProgressCallback<'_>>,
        cancel: Option<&CancellationToken>,
    ) -> ManagerResult<DownloadOutcome> {
        let mut state = TransferState::inspect(dest).await?;
        let mut response = self.request(url, &state).await?;

        if response.status == 416 && state.is_resuming() {
            debug!(url, offset = state.offset, "server rejected resume offset, restarting");
            remove_if_exists(&state.partial).await?;
            state.restart();
            response = self.request(url, &state).await?;
        }

        let mut file = self.prepare_destination(url, &mut state, &response).await?;
        state.total_size = response
            .content_length
            .map(|len| len + state.offset)
            .unwrap_or(0);

        let streamed = self
            .stream_download(url, &mut file, &mut state, response.body, progress, cancel)
            .await;

        // Whatever was recorded must be on disk before the next attempt measures it.
        let flushed = file.flush().await.map_err(|e| ManagerError::WriteFailed {
            path: state.partial.clone(),
            source: e,
        });
        streamed?;
        flushed?;
        drop(file);

        if state.total_size > 0 && state.transferred != state.total_size {
            return Err(ManagerError::Network {
                url: url.to_string(),
                reason: format!(
                    "body ended early ({} of {} bytes)",
                    state.transferred, state.total_size
                ),
            });
        }

        remove_if_exists(&state.destination).await?;
        fs::rename(&state.partial, &state.destination)
            .await
            .map_err(|e| ManagerError::RenameFailed {
                from: state.partial.clone(),
                to: state.destination.clone(),
                source: e,
            })?;

        Ok(state.finish())
    }

    /// Issue the GET, adding a range header when continuing a partial file.
    async fn request(&self, url: &str, state: &TransferState) -> ManagerResult<HttpResponse> {
        let mut headers = Vec::new();
        if state.is_resuming() {
            headers.push(("Range".to_string(), format!("bytes={}-", state.offset)));
        }
        self.transport.get(url, &headers).await
    }

    /// Open the partial file for appending or truncation depending on the reply.
    async fn prepare_destination(
        &self,
        url: &str,
        state: &mut TransferState,
        response: &HttpResponse,
    ) -> ManagerResult<File> {
        match response.status {
            206 if state.is_resuming() => {
                debug!(url, offset = state.offset, "resuming partial download");
                state.seed_digest_from_partial().await?;
                OpenOptions::new()
                    .append(true)
                    .open(&state.partial)
                    .await
                    .map_err(|e| ManagerError::WriteFailed {
                        path: state.partial.clone(),
                        source: e,
                    })
            }
            status if (200..300).contains(&status) => {
                if state.is_resuming() {
                    debug!(url, status, "server ignored range request, restarting from zero");
                }
                state.restart();
                File::create(&state.partial)
                    .await
                    .map_err(|e| ManagerError::WriteFailed {
                        path: state.partial.clone(),
                        source: e,
                    })
            }
            status => Err(ManagerError::DownloadFailed {
                url: url.to_string(),
                reason: format!("GET request failed with status {}", status),
            }),
        }
    }

    /// Stream the body into the partial file.
    async fn stream_download(
        &self,
        url: &str,
        file: &mut File,
        state: &mut TransferState,
        mut body: BodyStream,
        progress: Option<ProgressCallback<'_>>,
        cancel: Option<&CancellationToken>,
    ) -> ManagerResult<()> {
        loop {
            let next = match cancel {
                Some(token) => tokio::select! {
                    _ = token.cancelled() => {
                        return Err(ManagerError::Cancelled { url: url.to_string() });
                    }
                    next = body.next() => next,
                },
                None => body.next().await,
            };

            let Some(chunk) = next else {
                return Ok(());
            };
            let chunk = chunk?;

            file.write_all(&chunk)
                .await
                .map_err(|e| ManagerError::WriteFailed {
                    path: state.partial.clone(),
                    source: e,
                })?;
            state.record(&chunk);

            if let Some(cb) = progress {
                cb(&DownloadProgress::new(state.transferred, state.total_size));
            }
        }
    }
}

impl std::fmt::Debug for ResumableDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResumableDownloader")
            .field("timeout", &self.timeout)
            .field("resume_attempts", &self.resume_attempts)
            .finish_non_exhaustive()
    }
}

async fn remove_if_exists(path: &Path) -> ManagerResult<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ManagerError::RemoveFailed {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use futures::stream;
    use proptest::prelude::*;
    use sha2::{Digest, Sha256};
    use tempfile::TempDir;

    use super::*;
    use crate::manager::download::state::partial_path;
    use crate::manager::http::tests::{MockFailure, MockTransport};
    use crate::manager::traits::BoxFuture;

    const URL: &str = "https://cdn.example.com/patch.zip";

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    fn sha(data: &[u8]) -> String {
        format!("{:x}", Sha256::digest(data))
    }

    fn downloader(mock: &Arc<MockTransport>) -> ResumableDownloader {
        ResumableDownloader::new(Arc::clone(mock) as Arc<dyn HttpTransport>)
    }

    #[tokio::test]
    async fn test_fresh_download() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("staging").join("patch.zip");
        let body = payload(10_000);
        let mock = Arc::new(MockTransport::new());
        mock.serve(URL, body.clone());

        let seen = Mutex::new(Vec::new());
        let record = |p: &DownloadProgress| seen.lock().unwrap().push(*p);
        let outcome = downloader(&mock)
            .download(URL, &dest, Some(&record))
            .await
            .unwrap();

        assert_eq!(outcome.sha256, sha(&body));
        assert_eq!(outcome.bytes_written, 10_000);
        assert_eq!(outcome.total_size, 10_000);
        assert_eq!(std::fs::read(&dest).unwrap(), body);
        assert!(!partial_path(&dest).exists());

        let seen = seen.into_inner().unwrap();
        assert!(!seen.is_empty());
        assert!(seen.windows(2).all(|w| w[0].downloaded <= w[1].downloaded));
        let last = seen.last().unwrap();
        assert_eq!(last.downloaded, 10_000);
        assert_eq!(last.percent, 100.0);
    }

    #[tokio::test]
    async fn test_resumes_from_partial_file() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("patch.zip");
        let body = payload(8_000);
        std::fs::write(partial_path(&dest), &body[..3_000]).unwrap();

        let mock = Arc::new(MockTransport::new());
        mock.serve(URL, body.clone());

        let seen = Mutex::new(Vec::new());
        let record = |p: &DownloadProgress| seen.lock().unwrap().push(*p);
        let outcome = downloader(&mock)
            .download(URL, &dest, Some(&record))
            .await
            .unwrap();

        assert_eq!(outcome.sha256, sha(&body));
        assert_eq!(outcome.total_size, 8_000);
        assert_eq!(std::fs::read(&dest).unwrap(), body);

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].header("Range"), Some("bytes=3000-"));

        let seen = seen.into_inner().unwrap();
        assert!(seen[0].downloaded > 3_000);
    }

    #[tokio::test]
    async fn test_aborted_then_resumed_matches_single_download() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("patch.zip");
        let body = payload(9_000);
        let mock = Arc::new(MockTransport::new());
        mock.serve(URL, body.clone());
        mock.fail_next(URL, MockFailure::CutAfter(3_000));

        let dl = downloader(&mock).with_resume_attempts(1);
        let first = dl.download(URL, &dest, None).await;
        assert!(matches!(first, Err(ManagerError::DownloadFailed { .. })));
        assert!(!dest.exists());
        assert_eq!(std::fs::metadata(partial_path(&dest)).unwrap().len(), 3_000);

        let second = dl.download(URL, &dest, None).await.unwrap();
        assert_eq!(second.sha256, sha(&body));
        assert_eq!(std::fs::read(&dest).unwrap(), body);
    }

    #[tokio::test]
    async fn test_restarts_when_server_ignores_range() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("patch.zip");
        let body = payload(5_000);
        std::fs::write(partial_path(&dest), b"stale prefix bytes").unwrap();

        let mock = Arc::new(MockTransport::new());
        mock.serve_without_ranges(URL, body.clone());

        let outcome = downloader(&mock).download(URL, &dest, None).await.unwrap();

        assert_eq!(outcome.sha256, sha(&body));
        assert_eq!(outcome.bytes_written, 5_000);
        assert_eq!(std::fs::read(&dest).unwrap(), body);
    }

    #[tokio::test]
    async fn test_resumes_within_one_call_after_drop() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("patch.zip");
        let body = payload(7_000);
        let mock = Arc::new(MockTransport::new());
        mock.serve(URL, body.clone());
        mock.fail_next(URL, MockFailure::CutAfter(2_048));

        let outcome = downloader(&mock).download(URL, &dest, None).await.unwrap();

        assert_eq!(outcome.sha256, sha(&body));
        let requests = mock.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].header("Range"), None);
        assert_eq!(requests[1].header("Range"), Some("bytes=2048-"));
    }

    #[tokio::test]
    async fn test_progress_never_decreases_when_resume_restarts() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("patch.zip");
        let body = payload(7_000);
        let mock = Arc::new(MockTransport::new());
        mock.serve_without_ranges(URL, body.clone());
        mock.fail_next(URL, MockFailure::CutAfter(4_096));

        let seen = Mutex::new(Vec::new());
        let record = |p: &DownloadProgress| seen.lock().unwrap().push(p.downloaded);
        let outcome = downloader(&mock)
            .download(URL, &dest, Some(&record))
            .await
            .unwrap();

        assert_eq!(outcome.sha256, sha(&body));
        assert_eq!(mock.request_count(URL), 2);

        let seen = seen.into_inner().unwrap();
        assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{seen:?}");
        assert_eq!(seen.last().copied(), Some(7_000));
    }

    #[tokio::test]
    async fn test_oversized_partial_restarts_after_416() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("patch.zip");
        let body = payload(1_000);
        std::fs::write(partial_path(&dest), payload(4_000)).unwrap();

        let mock = Arc::new(MockTransport::new());
        mock.serve(URL, body.clone());

        let outcome = downloader(&mock).download(URL, &dest, None).await.unwrap();
        assert_eq!(outcome.sha256, sha(&body));
        assert_eq!(mock.request_count(URL), 2);
    }

    #[tokio::test]
    async fn test_http_error_is_download_failure() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("patch.zip");
        let mock = Arc::new(MockTransport::new());

        let result = downloader(&mock).download(URL, &dest, None).await;
        match result {
            Err(ManagerError::DownloadFailed { reason, .. }) => assert!(reason.contains("404")),
            other => panic!("Expected DownloadFailed, got {other:?}"),
        }
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_connect_failures_exhaust_attempts() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("patch.zip");
        let mock = Arc::new(MockTransport::new());
        mock.serve(URL, payload(100));
        for _ in 0..3 {
            mock.fail_next(URL, MockFailure::Connect);
        }

        let result = downloader(&mock).download(URL, &dest, None).await;
        assert!(matches!(result, Err(ManagerError::DownloadFailed { .. })));
        assert_eq!(mock.request_count(URL), 3);
    }

    #[tokio::test]
    async fn test_cancelled_download_keeps_partial() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("patch.zip");
        let mock = Arc::new(MockTransport::new());
        mock.serve(URL, payload(4_000));

        let token = CancellationToken::new();
        token.cancel();
        let result = downloader(&mock)
            .download_with_cancel(URL, &dest, None, Some(&token))
            .await;

        assert!(matches!(result, Err(ManagerError::Cancelled { .. })));
        assert!(partial_path(&dest).exists());
        assert!(!dest.exists());
    }

    /// Sends one chunk and then stalls forever.
    struct StallingTransport;

    impl HttpTransport for StallingTransport {
        fn get<'a>(
            &'a self,
            _url: &'a str,
            _headers: &'a [(String, String)],
        ) -> BoxFuture<'a, ManagerResult<HttpResponse>> {
            Box::pin(async move {
                let first: Vec<ManagerResult<bytes::Bytes>> =
                    vec![Ok(bytes::Bytes::from_static(b"0123456789"))];
                let body = stream::iter(first).chain(stream::pending::<ManagerResult<bytes::Bytes>>());
                Ok(HttpResponse {
                    status: 200,
                    content_length: Some(1_000),
                    body: body.boxed(),
                })
            })
        }
    }

    #[tokio::test]
    async fn test_timeout_keeps_partial() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("patch.zip");

        let result = ResumableDownloader::new(Arc::new(StallingTransport))
            .with_timeout(Duration::from_millis(100))
            .download(URL, &dest, None)
            .await;

        assert!(matches!(result, Err(ManagerError::Timeout { .. })));
        assert!(partial_path(&dest).exists());
        assert!(!dest.exists());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_split_download_digest_equals_single_download(
            body in proptest::collection::vec(any::<u8>(), 1..12_000),
            split in 0.0f64..1.0,
        ) {
            let cut = ((body.len() as f64) * split) as usize;
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async {
                let temp = TempDir::new().unwrap();
                let dest = temp.path().join("patch.zip");
                let mock = Arc::new(MockTransport::new());
                mock.serve(URL, body.clone());
                mock.fail_next(URL, MockFailure::CutAfter(cut));

                let dl = downloader(&mock).with_resume_attempts(1);
                let _ = dl.download(URL, &dest, None).await;
                let outcome = dl.download(URL, &dest, None).await.unwrap();

                assert_eq!(outcome.sha256, sha(&body));
                assert_eq!(std::fs::read(&dest).unwrap(), body);
            });
        }
    }
}
