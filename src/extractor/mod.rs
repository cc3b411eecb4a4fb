//! Source adapters ("extractors") and the ordered registry that dispatches
//! URLs to them.
//!
//! # Architecture
//!
//! Each supported host has one [`Extractor`]. For a URL it claims, the
//! extractor first classifies *what* the URL points at into a
//! [`SourceDescriptor`] (a user, a post, a subreddit, ...), then produces a
//! lazy [`MediaStream`] of descriptor batches for that source. Pagination is
//! private to the extractor; the stream simply ends when pages run out.
//!
//! The [`ExtractorRegistry`] tries extractors in registration order; the first
//! whose [`Extractor::matches`] returns true wins.
//!
//! # Example
//!
//! ```
//! use mediagrab_core::extractor::build_default_registry;
//!
//! let registry = build_default_registry();
//! let extractor = registry.find("https://www.reddit.com/r/pics/").unwrap();
//! assert_eq!(extractor.kind(), "Reddit");
//! ```

mod error;
pub mod http;
pub mod reddit;
pub mod redgifs;
mod registry;
pub mod utils;

use std::collections::BTreeMap;
use std::fmt;

use futures_util::stream::BoxStream;

pub use error::ExtractorError;
pub use reddit::Reddit;
pub use redgifs::RedGifs;
pub use registry::{ExtractorRegistry, build_default_registry};

use crate::download::{HttpClient, RetryPolicy};
use crate::media::{Media, MediaType, SessionStore};

/// Lazy sequence of descriptor batches produced by an extractor.
///
/// An `Err` item is terminal; the stream ending means no more pages.
pub type MediaStream = BoxStream<'static, Result<Vec<Media>, ExtractorError>>;

/// What inside a host a URL refers to.
///
/// `kind` is an explicit tag chosen by the extractor (`"user"`,
/// `"submission"`, ...); `fields` carries extractor-specific extras such as a
/// post id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceDescriptor {
    kind: String,
    name: String,
    fields: BTreeMap<String, String>,
}

impl SourceDescriptor {
    /// Creates a descriptor with no extra fields.
    #[must_use]
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Adds an extractor-specific field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Returns the source kind tag.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Returns the source name (user name, subreddit, ...).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns an extractor-specific field.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

/// Everything an extractor needs while streaming one source.
#[derive(Debug, Clone)]
pub struct ExtractorContext {
    /// Shared HTTP client (User-Agent, headers, timeouts already applied).
    pub http: HttpClient,
    /// Retry policy for API requests.
    pub retry: RetryPolicy,
    /// Adapter-private session metadata shared across queries.
    pub session: SessionStore,
    /// Result limit of the query; extractors may use it to bound pagination.
    pub limit: usize,
    /// Lowercase extension filter; empty accepts everything.
    pub extensions: Vec<String>,
}

/// Applies an extension filter inside an extractor.
///
/// Descriptors of unknown type are kept so deep expansion can still resolve
/// them; the query coordinator filters again afterwards.
#[must_use]
pub fn retain_requested(mut media: Vec<Media>, extensions: &[String]) -> Vec<Media> {
    media.retain(|m| m.media_type == MediaType::Unknown || m.matches_extensions(extensions));
    media
}

/// A host-specific source adapter.
///
/// Implementations are cheap to construct and stateless until queried.
/// Anything needed by the stream must be cloned into it, because
/// [`MediaStream`] is `'static`.
pub trait Extractor: Send + Sync {
    /// Stable kind tag, e.g. `"Reddit"`. Stored on every produced [`Media`].
    fn kind(&self) -> &'static str;

    /// Host suffix this extractor serves, e.g. `"reddit.com"`.
    fn host(&self) -> &str;

    /// Returns true if this extractor claims `url`.
    fn matches(&self, url: &str) -> bool {
        utils::has_host(url, self.host())
    }

    /// Classifies `url` into a source.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractorError::SourceNotFound`] if no pattern matches.
    fn classify_source(&self, url: &str) -> Result<SourceDescriptor, ExtractorError>;

    /// Streams descriptor batches for `source`.
    fn stream_media(&self, source: &SourceDescriptor, ctx: ExtractorContext) -> MediaStream;
}
