//! Download requests and their live, observable outcomes.
//!
//! A [`DownloadOutcome`] is handed to the caller as soon as a transfer
//! starts. The transfer loop is its only writer; any number of clones may read
//! the live counters, poll with [`DownloadOutcome::track`] or await the
//! terminal result.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, AtomicU16, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;

use super::error::DownloadError;
use crate::completion::{self, Completer, Completion, TRACK_INTERVAL};

/// Total size reported before the server declared one.
pub const UNKNOWN_SIZE: i64 = -1;

/// A file to fetch and where to put it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    /// Remote location of the file.
    pub url: String,
    /// Destination on disk. Partial content already there is resumed.
    pub path: PathBuf,
}

impl DownloadRequest {
    /// Creates a request.
    #[must_use]
    pub fn new(url: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            path: path.into(),
        }
    }
}

/// Point-in-time view of a transfer, passed to [`DownloadOutcome::track`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferSnapshot {
    /// Bytes of the destination file present so far, resume prefix included.
    pub bytes_transferred: u64,
    /// Total size, or [`UNKNOWN_SIZE`].
    pub total_size: i64,
    /// Fraction complete in `0.0..=1.0`; zero while the size is unknown.
    pub progress: f64,
}

#[derive(Debug)]
struct OutcomeState {
    request: DownloadRequest,
    status: AtomicU16,
    total_size: AtomicI64,
    transferred: AtomicU64,
    content_hash: OnceLock<String>,
    completion: Completion<DownloadError>,
    token: CancellationToken,
}

/// Live state and terminal result of one download.
#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    state: Arc<OutcomeState>,
}

/// Writing side of an outcome, owned by the transfer loop.
#[derive(Debug)]
pub(crate) struct OutcomeWriter {
    state: Arc<OutcomeState>,
    completer: Completer<DownloadError>,
}

impl DownloadOutcome {
    /// Creates a pending outcome and its writer.
    pub(crate) fn pending(request: DownloadRequest, token: CancellationToken) -> (Self, OutcomeWriter) {
        let (completer, completion) = completion::channel(DownloadError::aborted(&request.url));
        let state = Arc::new(OutcomeState::new(request, completion, token));
        (
            Self {
                state: Arc::clone(&state),
            },
            OutcomeWriter { state, completer },
        )
    }

    /// Creates an outcome that was canceled before its transfer began.
    #[must_use]
    pub fn canceled(request: DownloadRequest) -> Self {
        let error = DownloadError::canceled(&request.url);
        let token = CancellationToken::new();
        token.cancel();
        let completion = Completion::ready(Err(error));
        Self {
            state: Arc::new(OutcomeState::new(request, completion, token)),
        }
    }

    /// Returns the request this outcome belongs to.
    #[must_use]
    pub fn request(&self) -> &DownloadRequest {
        &self.state.request
    }

    /// Returns the source URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.state.request.url
    }

    /// Returns the destination path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.state.request.path
    }

    /// Returns the HTTP status of the latest response, if any was received.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self.state.status.load(Ordering::Acquire) {
            0 => None,
            status => Some(status),
        }
    }

    /// Returns the total size, or [`UNKNOWN_SIZE`] until known.
    #[must_use]
    pub fn total_size(&self) -> i64 {
        self.state.total_size.load(Ordering::Acquire)
    }

    /// Returns the number of bytes of the destination file present so far.
    #[must_use]
    pub fn bytes_transferred(&self) -> u64 {
        self.state.transferred.load(Ordering::Acquire)
    }

    /// Returns the fraction complete, or `0.0` while the size is unknown.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress(&self) -> f64 {
        let total = self.total_size();
        if total < 0 {
            return 0.0;
        }
        if total == 0 {
            return if self.state.completion.peek().is_some_and(|r| r.is_ok()) {
                1.0
            } else {
                0.0
            };
        }
        (self.bytes_transferred() as f64 / total as f64).clamp(0.0, 1.0)
    }

    /// Returns a snapshot of the live counters.
    #[must_use]
    pub fn snapshot(&self) -> TransferSnapshot {
        TransferSnapshot {
            bytes_transferred: self.bytes_transferred(),
            total_size: self.total_size(),
            progress: self.progress(),
        }
    }

    /// Returns the base-91 SHA-256 of the file; present only after success.
    #[must_use]
    pub fn content_hash(&self) -> Option<&str> {
        self.state.content_hash.get().map(String::as_str)
    }

    /// Returns true once the terminal result is available.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state.completion.is_complete()
    }

    /// Returns the terminal result if the transfer has finished.
    #[must_use]
    pub fn result(&self) -> Option<Result<(), DownloadError>> {
        self.state.completion.peek()
    }

    /// Requests cooperative cancellation of this transfer.
    pub fn cancel(&self) {
        self.state.token.cancel();
    }

    /// Waits for the transfer to finish.
    ///
    /// # Errors
    ///
    /// Returns the terminal [`DownloadError`] of the transfer.
    pub async fn wait(&self) -> Result<(), DownloadError> {
        self.state.completion.wait().await
    }

    /// Waits for completion and reads the downloaded file into memory.
    ///
    /// # Errors
    ///
    /// Returns the transfer error, or [`DownloadError::Io`] if the file
    /// cannot be read.
    pub async fn bytes(&self) -> Result<Vec<u8>, DownloadError> {
        self.wait().await?;
        tokio::fs::read(self.path())
            .await
            .map_err(|error| DownloadError::io(self.path(), error))
    }

    /// Samples progress every 100 ms until completion.
    ///
    /// `on_progress` always receives the final state before this returns.
    ///
    /// # Errors
    ///
    /// Returns the terminal [`DownloadError`] of the transfer.
    pub async fn track<F>(&self, mut on_progress: F) -> Result<(), DownloadError>
    where
        F: FnMut(TransferSnapshot),
    {
        let mut ticker = tokio::time::interval(TRACK_INTERVAL);
        let finished = self.wait();
        tokio::pin!(finished);
        loop {
            tokio::select! {
                result = &mut finished => {
                    on_progress(self.snapshot());
                    return result;
                }
                _ = ticker.tick() => on_progress(self.snapshot()),
            }
        }
    }
}

impl OutcomeState {
    fn new(request: DownloadRequest, completion: Completion<DownloadError>, token: CancellationToken) -> Self {
        Self {
            request,
            status: AtomicU16::new(0),
            total_size: AtomicI64::new(UNKNOWN_SIZE),
            transferred: AtomicU64::new(0),
            content_hash: OnceLock::new(),
            completion,
            token,
        }
    }
}

impl OutcomeWriter {
    pub(crate) fn request(&self) -> &DownloadRequest {
        &self.state.request
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.state.token
    }

    pub(crate) fn set_status(&self, status: u16) {
        self.state.status.store(status, Ordering::Release);
    }

    pub(crate) fn set_total_size(&self, total: i64) {
        self.state.total_size.store(total, Ordering::Release);
    }

    pub(crate) fn set_transferred(&self, bytes: u64) {
        self.state.transferred.store(bytes, Ordering::Release);
    }

    pub(crate) fn set_content_hash(&self, hash: String) {
        // Write-once; a second success cannot happen on one outcome.
        let _ = self.state.content_hash.set(hash);
    }

    pub(crate) fn finish(self, result: Result<(), DownloadError>) {
        self.completer.finish(result);
    }
}
