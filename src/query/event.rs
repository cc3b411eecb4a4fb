//! Observer events emitted while a query runs.

use std::sync::Arc;

/// Progress notifications for a top-level query.
///
/// Sub-queries run by deep expansion never emit events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// An extractor claimed the URL.
    ExtractorFound {
        /// Kind of the extractor.
        name: String,
    },
    /// The URL was classified into a source.
    SourceFound {
        /// Source kind tag.
        kind: String,
        /// Source name.
        name: String,
    },
    /// A batch was merged; `amount` counts only new descriptors.
    MediaQueried {
        /// Descriptors added by the batch.
        amount: usize,
    },
    /// The query finished successfully.
    QueryCompleted {
        /// Final number of descriptors.
        total: usize,
    },
}

/// Callback receiving [`Event`]s. Called from the query task.
pub type EventHandler = Arc<dyn Fn(&Event) + Send + Sync>;
