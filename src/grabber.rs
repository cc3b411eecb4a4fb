//! The caller-facing façade: queries and downloads over one shared client.

use std::sync::Arc;

use tracing::debug;

use crate::config::{ConfigError, GrabberConfig};
use crate::download::{BatchHandle, BatchOutcomes, DownloadEngine, DownloadOutcome, DownloadRequest, EngineError, HttpClient};
use crate::extractor::{ExtractorRegistry, build_default_registry};
use crate::media::{Metadata, SessionStore};
use crate::query::{Dispatcher, Event, EventHandler, QueryError, QueryHandle, QueryOptions, Response};

/// Entry point of the library.
///
/// Owns the HTTP client, the extractor registry and the session metadata
/// store. Cheap to clone; clones share everything.
///
/// # Example
///
/// ```no_run
/// use mediagrab_core::{Grabber, GrabberConfig, QueryOptions};
///
/// # async fn run() -> anyhow::Result<()> {
/// let grabber = Grabber::new(GrabberConfig::default())?;
/// let (response, _handle) = grabber.query(
///     "https://www.reddit.com/user/someone",
///     QueryOptions::new().with_limit(10),
/// )?;
/// response.wait().await?;
/// for media in response.media() {
///     println!("{media}");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Grabber {
    config: GrabberConfig,
    registry: ExtractorRegistry,
    session: SessionStore,
    events: Option<EventHandler>,
    http: HttpClient,
    dispatcher: Dispatcher,
    engine: DownloadEngine,
}

impl std::fmt::Debug for Grabber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grabber")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("events", &self.events.is_some())
            .finish_non_exhaustive()
    }
}

impl Grabber {
    /// Creates a grabber with the built-in extractors.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `config` fails validation or the HTTP
    /// client cannot be built from it.
    pub fn new(config: GrabberConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let http = HttpClient::with_options(&config.client_options())?;
        debug!(?config, "Grabber created");
        Ok(Self::assemble(
            config,
            http,
            build_default_registry(),
            SessionStore::new(),
            None,
        ))
    }

    fn assemble(
        config: GrabberConfig,
        http: HttpClient,
        registry: ExtractorRegistry,
        session: SessionStore,
        events: Option<EventHandler>,
    ) -> Self {
        let retry = config.retry_policy();
        let dispatcher = Dispatcher::new(
            registry.clone(),
            http.clone(),
            retry,
            session.clone(),
            config.expand_parallelism,
            events.clone(),
        );
        let engine = DownloadEngine::new(http.clone(), retry);
        Self {
            config,
            registry,
            session,
            events,
            http,
            dispatcher,
            engine,
        }
    }

    fn rebuild(self) -> Self {
        Self::assemble(self.config, self.http, self.registry, self.session, self.events)
    }

    /// Replaces the extractor registry.
    #[must_use]
    pub fn with_registry(mut self, registry: ExtractorRegistry) -> Self {
        self.registry = registry;
        self.rebuild()
    }

    /// Seeds the session store with metadata saved from an earlier run.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.session = SessionStore::from_metadata(metadata);
        self.rebuild()
    }

    /// Installs an observer for top-level query events.
    #[must_use]
    pub fn with_event_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.events = Some(Arc::new(handler));
        self.rebuild()
    }

    /// Returns the active configuration.
    #[must_use]
    pub fn config(&self) -> &GrabberConfig {
        &self.config
    }

    /// Returns the extractor registry.
    #[must_use]
    pub fn registry(&self) -> &ExtractorRegistry {
        &self.registry
    }

    /// Returns a snapshot of the session metadata.
    #[must_use]
    pub fn metadata(&self) -> Metadata {
        self.session.snapshot()
    }

    /// Starts a query. Must be called within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::NoExtractor`] if no extractor claims `url`.
    pub fn query(&self, url: &str, options: QueryOptions) -> Result<(Response, QueryHandle), QueryError> {
        self.dispatcher.query(url, options)
    }

    /// Starts one download. Must be called within a Tokio runtime.
    #[must_use]
    pub fn download(&self, request: DownloadRequest) -> DownloadOutcome {
        self.engine.download(request)
    }

    /// Starts a bounded-parallelism batch of downloads.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Pool`] if `parallelism` is outside `1..=100`.
    pub fn download_batch(
        &self,
        requests: Vec<DownloadRequest>,
        parallelism: usize,
    ) -> Result<(BatchOutcomes, BatchHandle), EngineError> {
        self.engine.download_batch(requests, parallelism)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::*;

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = GrabberConfig {
            expand_parallelism: 0,
            ..GrabberConfig::default()
        };
        assert!(Grabber::new(config).is_err());
    }

    #[test]
    fn test_with_metadata_seeds_session() {
        let mut metadata = Metadata::new();
        metadata.insert(
            "RedGifs".to_string(),
            HashMap::from([("token".to_string(), json!("abc"))]),
        );
        let grabber = Grabber::new(GrabberConfig::default())
            .unwrap()
            .with_metadata(metadata.clone());
        assert_eq!(grabber.metadata(), metadata);
    }

    #[tokio::test]
    async fn test_query_unknown_host_fails_synchronously() {
        let grabber = Grabber::new(GrabberConfig::default()).unwrap();
        let error = grabber
            .query("https://example.com/a.jpg", QueryOptions::new())
            .unwrap_err();
        assert!(matches!(error, QueryError::NoExtractor { .. }));
    }
}
