//! The streaming query protocol.
//!
//! A query turns one URL into a [`Response`]: the [`Dispatcher`] picks the
//! extractor, and a coordinator task drives the extractor's page stream,
//! merging each batch into the response until the limit is reached, the pages
//! run out, the extractor fails, or the caller cancels through the
//! [`QueryHandle`].
//!
//! With [`QueryOptions::with_deep`], descriptors of unknown type found on a
//! foreign host are resolved by running a nested single-result query on their
//! URL before they are merged.

mod coordinator;
mod dispatcher;
mod error;
mod event;
mod expand;
mod response;

pub use dispatcher::Dispatcher;
pub use error::QueryError;
pub use event::{Event, EventHandler};
pub use response::{QueryHandle, Response};

/// Per-query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    limit: usize,
    extensions: Vec<String>,
    deep: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            limit: usize::MAX,
            extensions: Vec::new(),
            deep: false,
        }
    }
}

impl QueryOptions {
    /// Unlimited, unfiltered, shallow.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps the result set at `limit` descriptors.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Keeps only descriptors with one of `extensions` (`"jpg"` or `".JPG"`).
    #[must_use]
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    /// Enables deep expansion of unknown-type descriptors.
    #[must_use]
    pub fn with_deep(mut self, deep: bool) -> Self {
        self.deep = deep;
        self
    }

    /// Returns the result limit.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Returns the normalized extension filter.
    #[must_use]
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Returns true if deep expansion is enabled.
    #[must_use]
    pub fn deep(&self) -> bool {
        self.deep
    }
}
