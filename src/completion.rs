//! Exactly-once completion signal for asynchronous operations.
//!
//! Both query result sets and download outcomes expose a terminal
//! `Result<(), E>` that any number of observers may await. The writing side
//! is a [`Completer`], consumed by [`Completer::finish`]; if it is dropped
//! without finishing (early return, task panic) it fires its abandonment
//! error instead, so the signal fires exactly once on every path.

use std::time::Duration;

use tokio::sync::watch;

/// Sampling interval of the polling `track` observers of queries and downloads.
pub(crate) const TRACK_INTERVAL: Duration = Duration::from_millis(100);

type State<E> = Option<Result<(), E>>;

/// Writing half of a completion signal. Owned by exactly one task.
#[derive(Debug)]
pub(crate) struct Completer<E> {
    tx: watch::Sender<State<E>>,
    on_abandon: Option<E>,
}

/// Observing half of a completion signal. Cheap to clone.
#[derive(Debug, Clone)]
pub(crate) struct Completion<E> {
    rx: watch::Receiver<State<E>>,
}

/// Creates a linked completer/completion pair.
///
/// `on_abandon` is the terminal error reported if the completer is dropped
/// without an explicit [`Completer::finish`].
pub(crate) fn channel<E: Clone>(on_abandon: E) -> (Completer<E>, Completion<E>) {
    let (tx, rx) = watch::channel(None);
    (
        Completer {
            tx,
            on_abandon: Some(on_abandon),
        },
        Completion { rx },
    )
}

impl<E> Completer<E> {
    /// Fires the signal with the terminal result.
    pub(crate) fn finish(mut self, result: Result<(), E>) {
        self.on_abandon = None;
        self.fire(result);
    }

    fn fire(&self, result: Result<(), E>) {
        self.tx.send_if_modified(|state| {
            if state.is_some() {
                return false;
            }
            *state = Some(result);
            true
        });
    }
}

impl<E> Drop for Completer<E> {
    fn drop(&mut self) {
        if let Some(error) = self.on_abandon.take() {
            self.fire(Err(error));
        }
    }
}

impl<E: Clone> Completion<E> {
    /// Returns a completion that has already fired with `result`.
    pub(crate) fn ready(result: Result<(), E>) -> Self {
        let (_tx, rx) = watch::channel(Some(result));
        Self { rx }
    }

    /// Returns true once the terminal result is available.
    pub(crate) fn is_complete(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// Returns the terminal result if it is already available.
    pub(crate) fn peek(&self) -> Option<Result<(), E>> {
        self.rx.borrow().clone()
    }

    /// Waits for the terminal result.
    pub(crate) async fn wait(&self) -> Result<(), E> {
        let mut rx = self.rx.clone();
        // The watch guard borrows `rx`; release it before the fallback read.
        let waited = rx
            .wait_for(Option::is_some)
            .await
            .map(|state| state.clone());
        match waited {
            Ok(state) => state.unwrap_or(Ok(())),
            // Sender gone: the last value it wrote is still readable.
            Err(_) => rx.borrow().clone().unwrap_or(Ok(())),
        }
    }
}
