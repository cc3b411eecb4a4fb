//! URL dispatch: binds a query to the first extractor claiming its URL.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::coordinator::{QueryRun, run_query};
use super::{EventHandler, QueryError, QueryHandle, QueryOptions, Response};
use crate::download::{HttpClient, RetryPolicy};
use crate::extractor::ExtractorRegistry;
use crate::media::SessionStore;

struct DispatcherInner {
    registry: ExtractorRegistry,
    http: HttpClient,
    retry: RetryPolicy,
    session: SessionStore,
    expand_parallelism: usize,
    events: Option<EventHandler>,
}

impl std::fmt::Debug for DispatcherInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("retry", &self.retry)
            .field("expand_parallelism", &self.expand_parallelism)
            .field("events", &self.events.is_some())
            .finish_non_exhaustive()
    }
}

/// Starts queries against a fixed extractor registry.
///
/// Cheap to clone; all clones share one session store.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

impl Dispatcher {
    /// Creates a dispatcher.
    #[must_use]
    pub fn new(
        registry: ExtractorRegistry,
        http: HttpClient,
        retry: RetryPolicy,
        session: SessionStore,
        expand_parallelism: usize,
        events: Option<EventHandler>,
    ) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                registry,
                http,
                retry,
                session,
                expand_parallelism,
                events,
            }),
        }
    }

    /// Returns the registry used for dispatch.
    #[must_use]
    pub fn registry(&self) -> &ExtractorRegistry {
        &self.inner.registry
    }

    /// Returns the shared session store.
    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    pub(crate) fn http(&self) -> &HttpClient {
        &self.inner.http
    }

    pub(crate) fn retry(&self) -> RetryPolicy {
        self.inner.retry
    }

    pub(crate) fn expand_parallelism(&self) -> usize {
        self.inner.expand_parallelism
    }

    /// Starts a query in the background.
    ///
    /// Must be called within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::NoExtractor`] if no registered extractor claims
    /// `url`. Every later failure is reported through [`Response::wait`].
    pub fn query(&self, url: &str, options: QueryOptions) -> Result<(Response, QueryHandle), QueryError> {
        self.spawn(url, options, CancellationToken::new(), self.inner.events.clone())
    }

    /// Starts an event-less query cancelled together with `parent`.
    pub(crate) fn query_nested(
        &self,
        url: &str,
        options: QueryOptions,
        parent: &CancellationToken,
    ) -> Result<(Response, QueryHandle), QueryError> {
        self.spawn(url, options, parent.child_token(), None)
    }

    fn spawn(
        &self,
        url: &str,
        options: QueryOptions,
        token: CancellationToken,
        events: Option<EventHandler>,
    ) -> Result<(Response, QueryHandle), QueryError> {
        let Some(extractor) = self.inner.registry.find(url) else {
            debug!(url, "Query rejected: no extractor");
            return Err(QueryError::no_extractor(url));
        };

        let (response, writer) = Response::pending(url, extractor.kind(), self.inner.session.clone());
        let handle = QueryHandle::new(token.clone());
        tokio::spawn(run_query(QueryRun {
            dispatcher: self.clone(),
            extractor,
            url: url.to_string(),
            options,
            writer,
            token,
            events,
        }));
        Ok((response, handle))
    }
}
