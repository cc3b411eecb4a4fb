//! HTTP client wrapper shared by downloads and extractors.
//!
//! `HttpClient` owns one connection-pooled `reqwest::Client` configured with
//! timeouts, a User-Agent and any extra default headers. Cloning it is cheap.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, RANGE};
use reqwest::{Client, Response};
use tracing::{debug, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use super::error::DownloadError;
use crate::user_agent;

/// Settings applied to every request made through an [`HttpClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// User-Agent header value.
    pub user_agent: String,
    /// Extra headers sent with every request.
    pub headers: Vec<(String, String)>,
    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Whole-request read timeout in seconds.
    pub read_timeout_secs: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            user_agent: user_agent::default_user_agent(),
            headers: Vec::new(),
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            read_timeout_secs: READ_TIMEOUT_SECS,
        }
    }
}

/// Errors raised while building the underlying HTTP client.
#[derive(Debug, thiserror::Error)]
pub enum ClientBuildError {
    /// A configured header name is not a valid HTTP token.
    #[error("invalid header name '{name}'")]
    InvalidHeaderName {
        /// The rejected header name.
        name: String,
    },
    /// A configured header value contains forbidden characters.
    #[error("invalid value for header '{name}'")]
    InvalidHeaderValue {
        /// The header whose value was rejected.
        name: String,
    },
    /// reqwest refused the builder configuration.
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
}

/// HTTP client for downloads and extractor API calls.
///
/// Designed to be created once and reused, taking advantage of connection
/// pooling.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a client with default timeouts and User-Agent.
    ///
    /// # Errors
    ///
    /// Returns [`ClientBuildError::Build`] if the TLS backend cannot be
    /// initialized.
    pub fn new() -> Result<Self, ClientBuildError> {
        Self::with_options(&ClientOptions::default())
    }

    /// Creates a client from explicit options.
    ///
    /// # Errors
    ///
    /// Returns an error when a header is invalid or the client cannot be built.
    #[instrument(level = "debug", skip(options), fields(headers = options.headers.len()))]
    pub fn with_options(options: &ClientOptions) -> Result<Self, ClientBuildError> {
        let headers = build_header_map(&options.headers)?;
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(options.connect_timeout_secs))
            .timeout(Duration::from_secs(options.read_timeout_secs))
            .gzip(true)
            .cookie_store(true)
            .user_agent(options.user_agent.clone())
            .default_headers(headers)
            .build()
            .map_err(ClientBuildError::Build)?;
        Ok(Self { client })
    }

    /// Issues a GET for `url`, with a `Range: bytes={offset}-` header when
    /// `range_start` is non-zero.
    ///
    /// Any HTTP status is returned to the caller; only transport failures
    /// become errors.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidUrl`] for unparsable URLs and
    /// [`DownloadError::Network`]/[`DownloadError::Timeout`] for transport
    /// failures.
    pub async fn get(&self, url: &str, range_start: Option<u64>) -> Result<Response, DownloadError> {
        let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
        let mut request = self.client.get(parsed);
        if let Some(offset) = range_start.filter(|offset| *offset > 0) {
            debug!(url, offset, "requesting byte range");
            request = request.header(RANGE, format!("bytes={offset}-"));
        }
        request
            .send()
            .await
            .map_err(|error| DownloadError::network(url, error))
    }

    /// Returns the underlying reqwest client for requests outside the
    /// download path.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

fn build_header_map(headers: &[(String, String)]) -> Result<HeaderMap, ClientBuildError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ClientBuildError::InvalidHeaderName { name: name.clone() })?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| ClientBuildError::InvalidHeaderValue { name: name.clone() })?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}
