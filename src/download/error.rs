//! Error types for the download module.
//!
//! Every variant carries the URL or path it concerns. Download errors travel
//! through a [`DownloadOutcome`](super::DownloadOutcome) completion signal and
//! may be observed by several waiters, so the type is `Clone`; non-`Clone`
//! sources are held in an `Arc`.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Errors that can occur during file downloads.
#[derive(Debug, Clone, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: Arc<reqwest::Error>,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP response outside the 2xx range.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The body stream broke after `bytes` bytes of this attempt were written.
    #[error("transfer of {url} interrupted after {bytes} bytes: {reason}")]
    Interrupted {
        /// The URL being transferred.
        url: String,
        /// Bytes written during the interrupted attempt.
        bytes: u64,
        /// Description of the stream failure.
        reason: String,
    },

    /// File system error during download (create file, write, etc.)
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The server reported the resource as missing (404) or gone (410).
    #[error("HTTP {status} downloading {url}: resource not found")]
    NotFound {
        /// The URL that was not found.
        url: String,
        /// The HTTP status code (404 or 410).
        status: u16,
    },

    /// The transfer was canceled by the caller.
    #[error("download of {url} canceled")]
    Canceled {
        /// The URL whose transfer was canceled.
        url: String,
    },

    /// The transfer task ended without reporting a result.
    #[error("download of {url} aborted unexpectedly")]
    Aborted {
        /// The URL whose transfer was aborted.
        url: String,
    },
}

impl DownloadError {
    /// Creates a network error, promoting timeouts to [`DownloadError::Timeout`].
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            return Self::timeout(url);
        }
        Self::Network {
            url: url.into(),
            source: Arc::new(source),
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates a mid-stream interruption error.
    pub fn interrupted(url: impl Into<String>, bytes: u64, reason: impl Into<String>) -> Self {
        Self::Interrupted {
            url: url.into(),
            bytes,
            reason: reason.into(),
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a not-found error.
    pub fn not_found(url: impl Into<String>, status: u16) -> Self {
        Self::NotFound {
            url: url.into(),
            status,
        }
    }

    /// Creates a cancellation error.
    pub fn canceled(url: impl Into<String>) -> Self {
        Self::Canceled { url: url.into() }
    }

    /// Creates an abandonment error.
    pub fn aborted(url: impl Into<String>) -> Self {
        Self::Aborted { url: url.into() }
    }

    /// Returns true for failures the engine retries with backoff.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::Timeout { .. } | Self::HttpStatus { .. } | Self::Interrupted { .. }
        )
    }

    /// Returns true if the transfer was canceled by the caller.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled { .. })
    }
}
