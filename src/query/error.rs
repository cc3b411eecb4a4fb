//! Error types for queries.
//!
//! A query's terminal error is observed through its [`Response`](super::Response)
//! by any number of waiters, so the type is `Clone`.

use thiserror::Error;

use crate::extractor::ExtractorError;

/// Errors that end a query.
#[derive(Debug, Clone, Error)]
pub enum QueryError {
    /// No registered extractor claims the URL.
    #[error("no extractor found for URL '{url}'\n  Suggestion: {suggestion}")]
    NoExtractor {
        /// The URL nobody claimed.
        url: String,
        /// How to fix the issue.
        suggestion: String,
    },

    /// The extractor could not tell what the URL points at.
    #[error("could not classify source of '{url}': {source}")]
    SourceClassification {
        /// The queried URL.
        url: String,
        /// The extractor's classification error.
        #[source]
        source: ExtractorError,
    },

    /// The extractor failed while streaming pages.
    #[error("query of '{url}' failed: {source}")]
    Extractor {
        /// The queried URL.
        url: String,
        /// The extractor's streaming error.
        #[source]
        source: ExtractorError,
    },

    /// The caller canceled the query.
    #[error("query of '{url}' canceled")]
    Canceled {
        /// The queried URL.
        url: String,
    },

    /// The query task ended without reporting a result.
    #[error("query of '{url}' aborted unexpectedly")]
    Aborted {
        /// The queried URL.
        url: String,
    },
}

impl QueryError {
    /// Creates a `NoExtractor` error.
    #[must_use]
    pub fn no_extractor(url: &str) -> Self {
        Self::NoExtractor {
            url: url.to_string(),
            suggestion: "Check the URL host; supported hosts are reddit.com and redgifs.com"
                .to_string(),
        }
    }

    /// Creates a `SourceClassification` error.
    #[must_use]
    pub fn source_classification(url: &str, source: ExtractorError) -> Self {
        Self::SourceClassification {
            url: url.to_string(),
            source,
        }
    }

    /// Creates an `Extractor` error.
    #[must_use]
    pub fn extractor(url: &str, source: ExtractorError) -> Self {
        Self::Extractor {
            url: url.to_string(),
            source,
        }
    }

    /// Creates a `Canceled` error.
    #[must_use]
    pub fn canceled(url: &str) -> Self {
        Self::Canceled {
            url: url.to_string(),
        }
    }

    /// Creates an `Aborted` error.
    #[must_use]
    pub fn aborted(url: &str) -> Self {
        Self::Aborted {
            url: url.to_string(),
        }
    }

    /// Returns true if the query was canceled by the caller.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled { .. })
    }
}
