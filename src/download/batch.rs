//! Bounded-parallelism batch downloads with aggregate cancellation.
//!
//! A driver task admits requests in order through a [`TaskPool`]. Each
//! admitted request's outcome is emitted as soon as its transfer starts, so
//! callers can attach progress observers right away; the pool slot is only
//! released once that transfer completes. Canceling the batch stops admission
//! and cancels every transfer already started. Requests never admitted are
//! still emitted, already completed with a cancellation error.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::engine::DownloadEngine;
use super::outcome::{DownloadOutcome, DownloadRequest};
use crate::pool::{PoolError, TaskPool};

/// Default batch parallelism.
pub const DEFAULT_PARALLELISM: usize = 4;

/// Error type for batch download setup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// Invalid parallelism value provided.
    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Receiving end of a batch: yields one outcome per request, in admission
/// order, then closes.
pub type BatchOutcomes = mpsc::UnboundedReceiver<DownloadOutcome>;

/// Aggregate cancel handle for a running batch.
#[derive(Debug, Clone)]
pub struct BatchHandle {
    token: CancellationToken,
}

impl BatchHandle {
    /// Stops admitting requests and cancels every started transfer.
    pub fn cancel_all(&self) {
        self.token.cancel();
    }

    /// Returns true once the batch has been canceled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl DownloadEngine {
    /// Downloads `requests` with at most `parallelism` concurrent transfers.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Pool`] if `parallelism` is outside `1..=100`.
    #[instrument(skip(self, requests), fields(count = requests.len()))]
    pub fn download_batch(
        &self,
        requests: Vec<DownloadRequest>,
        parallelism: usize,
    ) -> Result<(BatchOutcomes, BatchHandle), EngineError> {
        let pool = TaskPool::new(parallelism)?;
        let handle = BatchHandle {
            token: pool.token().clone(),
        };
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = self.clone();

        tokio::spawn(async move {
            let total = requests.len();
            let mut started = 0_usize;
            let mut pending = requests.into_iter();

            while let Some(request) = pending.next() {
                let Some(permit) = pool.admit().await else {
                    debug!(started, remaining = total - started, "batch canceled, skipping rest");
                    // Receiver may be gone; outcomes are then simply dropped.
                    let _ = tx.send(DownloadOutcome::canceled(request));
                    for request in pending.by_ref() {
                        let _ = tx.send(DownloadOutcome::canceled(request));
                    }
                    break;
                };

                let outcome = engine.start(request, pool.token().child_token());
                started += 1;
                let _ = tx.send(outcome.clone());
                pool.spawn(permit, async move {
                    let _ = outcome.wait().await;
                });
            }

            info!(started, total, "batch admission finished");
        });

        Ok((rx, handle))
    }
}
