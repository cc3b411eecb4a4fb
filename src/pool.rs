//! Bounded-parallelism task pool with cooperative cancellation.
//!
//! [`TaskPool`] is a counting admission gate: at most `parallelism` admitted
//! tasks hold a permit at any time, and later callers wait in
//! [`TaskPool::admit`] until a slot frees. Cancelling the pool stops
//! admission; tasks already running observe the pool's token at their own
//! checkpoints.
//!
//! The pool is used both by media expansion and by the batch downloader.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Minimum allowed parallelism value.
pub const MIN_PARALLELISM: usize = 1;

/// Maximum allowed parallelism value.
pub const MAX_PARALLELISM: usize = 100;

/// Errors raised when building a pool.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// Parallelism outside the supported range.
    #[error(
        "invalid parallelism value {value}: must be between {MIN_PARALLELISM} and {MAX_PARALLELISM}"
    )]
    InvalidParallelism {
        /// The rejected value.
        value: usize,
    },
}

/// Counting admission gate over spawned Tokio tasks.
#[derive(Debug, Clone)]
pub struct TaskPool {
    semaphore: Arc<Semaphore>,
    token: CancellationToken,
    parallelism: usize,
}

impl TaskPool {
    /// Creates a pool admitting at most `parallelism` concurrent tasks.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidParallelism`] if the value is outside
    /// `1..=100`.
    pub fn new(parallelism: usize) -> Result<Self, PoolError> {
        Self::with_token(parallelism, CancellationToken::new())
    }

    /// Creates a pool whose admission stops when `token` is cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidParallelism`] if the value is outside
    /// `1..=100`.
    pub fn with_token(parallelism: usize, token: CancellationToken) -> Result<Self, PoolError> {
        if !(MIN_PARALLELISM..=MAX_PARALLELISM).contains(&parallelism) {
            return Err(PoolError::InvalidParallelism { value: parallelism });
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(parallelism)),
            token,
            parallelism,
        })
    }

    /// Returns the configured parallelism.
    #[must_use]
    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Returns the pool's cancellation token.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Stops admitting new tasks.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns true once the pool has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Waits for a free slot.
    ///
    /// Returns `None` when the pool is cancelled before or while waiting.
    pub async fn admit(&self) -> Option<OwnedSemaphorePermit> {
        let permit = tokio::select! {
            biased;
            () = self.token.cancelled() => return None,
            permit = Arc::clone(&self.semaphore).acquire_owned() => permit.ok()?,
        };

        // A cancel may race with the acquire; the gate boundary is the checkpoint.
        if self.token.is_cancelled() {
            return None;
        }
        Some(permit)
    }

    /// Spawns `task`, releasing `permit` when it finishes.
    pub fn spawn<F>(&self, permit: OwnedSemaphorePermit, task: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        tokio::spawn(async move {
            let _permit = permit;
            task.await
        })
    }

    /// Runs `task` over every item with bounded parallelism.
    ///
    /// Results are returned in input order. An entry is `None` when the item
    /// was never admitted (the pool was cancelled) or its task panicked.
    pub async fn run_ordered<T, R, F, Fut>(&self, items: Vec<T>, task: F) -> Vec<Option<R>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut,
        Fut: Future<Output = R> + Send + 'static,
    {
        let mut handles = Vec::with_capacity(items.len());

        for item in items {
            match self.admit().await {
                Some(permit) => handles.push(Some(self.spawn(permit, task(item)))),
                None => handles.push(None),
            }
        }

        debug!(
            tasks = handles.len(),
            parallelism = self.parallelism,
            "waiting for pooled tasks"
        );

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            let result = match handle {
                Some(handle) => match handle.await {
                    Ok(value) => Some(value),
                    Err(error) => {
                        warn!(error = %error, "pooled task panicked");
                        None
                    }
                },
                None => None,
            };
            results.push(result);
        }
        results
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_pool_rejects_zero_parallelism() {
        assert_eq!(
            TaskPool::new(0).unwrap_err(),
            PoolError::InvalidParallelism { value: 0 }
        );
    }

    #[test]
    fn test_pool_rejects_parallelism_above_max() {
        assert!(TaskPool::new(MAX_PARALLELISM + 1).is_err());
        assert_eq!(TaskPool::new(MAX_PARALLELISM).unwrap().parallelism(), 100);
    }

    #[tokio::test]
    async fn test_run_ordered_preserves_input_order() {
        let pool = TaskPool::new(3).unwrap();
        let results = pool
            .run_ordered(vec![30_u64, 10, 20, 0], |delay| async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                delay * 2
            })
            .await;
        assert_eq!(results, vec![Some(60), Some(20), Some(40), Some(0)]);
    }

    #[tokio::test]
    async fn test_run_ordered_never_exceeds_parallelism() {
        let pool = TaskPool::new(2).unwrap();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        pool.run_ordered((0..8).collect::<Vec<u32>>(), |_| {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            }
        })
        .await;

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_admit_returns_none_after_cancel() {
        let pool = TaskPool::new(1).unwrap();
        let held = pool.admit().await.unwrap();

        let waiter = tokio::spawn({
            let pool = pool.clone();
            async move { pool.admit().await.is_none() }
        });
        tokio::task::yield_now().await;
        pool.cancel();

        assert!(waiter.await.unwrap(), "blocked admit should give up on cancel");
        drop(held);
        assert!(pool.admit().await.is_none());
    }

    #[tokio::test]
    async fn test_run_ordered_skips_items_after_cancel() {
        let pool = TaskPool::new(1).unwrap();
        pool.cancel();
        let results = pool.run_ordered(vec![1, 2], |n| async move { n }).await;
        assert_eq!(results, vec![None, None]);
    }
}
