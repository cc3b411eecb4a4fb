//! Error types for extractor operations.
//!
//! Extractor errors end a query's stream and become its terminal error, so
//! they are `Clone`; the network source is shared through an `Arc`.

use std::sync::Arc;

use thiserror::Error;

/// Errors raised by extractors while classifying or streaming a source.
#[derive(Debug, Clone, Error)]
pub enum ExtractorError {
    /// The URL does not point at any source this extractor understands.
    #[error("source type not found for URL '{url}' ({extractor})\n  Suggestion: {suggestion}")]
    SourceNotFound {
        /// The URL that could not be classified.
        url: String,
        /// Kind of the extractor that rejected it.
        extractor: String,
        /// How to fix the issue.
        suggestion: String,
    },

    /// The host API answered with a non-success status.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The API URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Transport-level failure talking to the host API.
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The API URL.
        url: String,
        /// The underlying network error.
        #[source]
        source: Arc<reqwest::Error>,
    },

    /// The host API answered with a body that could not be understood.
    #[error("invalid response from {url}: {reason}")]
    InvalidResponse {
        /// The API URL.
        url: String,
        /// What was wrong with the body.
        reason: String,
    },
}

impl ExtractorError {
    /// Creates a `SourceNotFound` error.
    #[must_use]
    pub fn source_not_found(url: &str, extractor: &str) -> Self {
        Self::SourceNotFound {
            url: url.to_string(),
            extractor: extractor.to_string(),
            suggestion: "Check that the URL points to a post, user or collection page".to_string(),
        }
    }

    /// Creates an `HttpStatus` error.
    #[must_use]
    pub fn http_status(url: &str, status: u16) -> Self {
        Self::HttpStatus {
            url: url.to_string(),
            status,
        }
    }

    /// Creates a `Network` error.
    #[must_use]
    pub fn network(url: &str, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.to_string(),
            source: Arc::new(source),
        }
    }

    /// Creates an `InvalidResponse` error.
    #[must_use]
    pub fn invalid_response(url: &str, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// Returns true for failures worth retrying: transport errors, rate
    /// limiting and server errors.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network { .. } => true,
            Self::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            Self::SourceNotFound { .. } | Self::InvalidResponse { .. } => false,
        }
    }
}
