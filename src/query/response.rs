//! The incrementally built result set of one query.
//!
//! The query coordinator is the only writer. Callers may take snapshots or
//! poll the length at any time; once [`Response::wait`] returns the media list
//! no longer changes.

use std::sync::{Arc, PoisonError, RwLock};

use tokio_util::sync::CancellationToken;

use super::QueryError;
use crate::completion::{self, Completer, Completion, TRACK_INTERVAL};
use crate::media::{Media, Metadata, SessionStore, merge_into, truncate_to_limit};

#[derive(Debug)]
struct ResponseState {
    url: String,
    extractor: &'static str,
    media: RwLock<Vec<Media>>,
    session: SessionStore,
    completion: Completion<QueryError>,
}

/// Result set of a query: deduplicated, limit-bounded, growing until complete.
#[derive(Debug, Clone)]
pub struct Response {
    state: Arc<ResponseState>,
}

/// Writing side of a response, owned by the coordinator task.
#[derive(Debug)]
pub(crate) struct ResponseWriter {
    state: Arc<ResponseState>,
    completer: Completer<QueryError>,
}

/// Cancel handle returned alongside a [`Response`].
#[derive(Debug, Clone)]
pub struct QueryHandle {
    token: CancellationToken,
}

impl QueryHandle {
    pub(crate) fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Requests cancellation; observed between batches.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns true once cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Response {
    pub(crate) fn pending(url: &str, extractor: &'static str, session: SessionStore) -> (Self, ResponseWriter) {
        let (completer, completion) = completion::channel(QueryError::aborted(url));
        let state = Arc::new(ResponseState {
            url: url.to_string(),
            extractor,
            media: RwLock::new(Vec::new()),
            session,
            completion,
        });
        (
            Self {
                state: Arc::clone(&state),
            },
            ResponseWriter { state, completer },
        )
    }

    /// Returns the queried URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.state.url
    }

    /// Returns the kind of the extractor serving this query.
    #[must_use]
    pub fn extractor(&self) -> &'static str {
        self.state.extractor
    }

    /// Returns a snapshot of the descriptors found so far, in merge order.
    #[must_use]
    pub fn media(&self) -> Vec<Media> {
        self.state
            .media
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the number of descriptors found so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state
            .media
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if nothing has been found yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a snapshot of the extractor session metadata, suitable for
    /// passing to a later grabber via `with_metadata`.
    #[must_use]
    pub fn metadata(&self) -> Metadata {
        self.state.session.snapshot()
    }

    /// Returns true once the query has finished.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state.completion.is_complete()
    }

    /// Returns the terminal result if the query has finished.
    #[must_use]
    pub fn result(&self) -> Option<Result<(), QueryError>> {
        self.state.completion.peek()
    }

    /// Waits for the query to finish.
    ///
    /// # Errors
    ///
    /// Returns the query's terminal [`QueryError`]. Descriptors merged before
    /// the failure remain available through [`Response::media`].
    pub async fn wait(&self) -> Result<(), QueryError> {
        self.state.completion.wait().await
    }

    /// Samples the result size every 100 ms until the query finishes.
    ///
    /// `on_progress(added, total)` is called whenever the size changed since
    /// the previous sample, and always once with the final state.
    ///
    /// # Errors
    ///
    /// Returns the query's terminal [`QueryError`].
    pub async fn track<F>(&self, mut on_progress: F) -> Result<(), QueryError>
    where
        F: FnMut(usize, usize),
    {
        let mut reported = 0;
        let mut ticker = tokio::time::interval(TRACK_INTERVAL);
        let finished = self.wait();
        tokio::pin!(finished);
        loop {
            tokio::select! {
                result = &mut finished => {
                    let total = self.len();
                    on_progress(total.saturating_sub(reported), total);
                    return result;
                }
                _ = ticker.tick() => {
                    let total = self.len();
                    if total != reported {
                        on_progress(total.saturating_sub(reported), total);
                        reported = total;
                    }
                }
            }
        }
    }
}

impl ResponseWriter {
    /// Merges a batch and enforces the limit; returns `(added, total)`.
    pub(crate) fn merge(&self, batch: Vec<Media>, limit: usize) -> (usize, usize) {
        let mut media = self
            .state
            .media
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = media.len();
        merge_into(&mut media, batch);
        truncate_to_limit(&mut media, limit);
        let total = media.len();
        (total.saturating_sub(before), total)
    }

    pub(crate) fn len(&self) -> usize {
        self.state
            .media
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub(crate) fn finish(self, result: Result<(), QueryError>) {
        self.completer.finish(result);
    }
}
