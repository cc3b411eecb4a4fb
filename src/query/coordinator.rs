//! Query coordinator: drives one extractor's page stream into a response.
//!
//! States: resolving the source, streaming batches, then exactly one of
//! completed, canceled or failed. The terminal result is always delivered
//! through the [`ResponseWriter`]; a panic in this task surfaces as
//! [`QueryError::Aborted`].

use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span};

use super::expand::expand;
use super::response::ResponseWriter;
use super::{Dispatcher, Event, EventHandler, QueryError, QueryOptions};
use crate::extractor::{Extractor, ExtractorContext};

/// Everything one coordinator run owns.
pub(crate) struct QueryRun {
    pub(crate) dispatcher: Dispatcher,
    pub(crate) extractor: Arc<dyn Extractor>,
    pub(crate) url: String,
    pub(crate) options: QueryOptions,
    pub(crate) writer: ResponseWriter,
    pub(crate) token: CancellationToken,
    pub(crate) events: Option<EventHandler>,
}

impl QueryRun {
    fn emit(&self, event: &Event) {
        if let Some(handler) = &self.events {
            handler(event);
        }
    }
}

/// Runs a query to completion.
///
/// Boxed so that deep expansion can start nested queries from inside a run.
pub(crate) fn run_query(run: QueryRun) -> BoxFuture<'static, ()> {
    let span = info_span!("query", url = %run.url, extractor = run.extractor.kind());
    Box::pin(
        async move {
            let result = drive(&run).await;
            match &result {
                Ok(()) => {
                    let total = run.writer.len();
                    info!(total, "Query completed");
                    run.emit(&Event::QueryCompleted { total });
                }
                Err(error) if error.is_canceled() => info!(found = run.writer.len(), "Query canceled"),
                Err(error) => debug!(%error, found = run.writer.len(), "Query failed"),
            }
            run.writer.finish(result);
        }
        .instrument(span),
    )
}

async fn drive(run: &QueryRun) -> Result<(), QueryError> {
    let url = run.url.as_str();
    let limit = run.options.limit();

    run.emit(&Event::ExtractorFound {
        name: run.extractor.kind().to_string(),
    });

    if limit == 0 {
        debug!("Limit is zero, nothing to query");
        return Ok(());
    }

    let source = run
        .extractor
        .classify_source(url)
        .map_err(|source| QueryError::source_classification(url, source))?;
    debug!(%source, "Source resolved");
    run.emit(&Event::SourceFound {
        kind: source.kind().to_string(),
        name: source.name().to_string(),
    });

    let ctx = ExtractorContext {
        http: run.dispatcher.http().clone(),
        retry: run.dispatcher.retry(),
        session: run.dispatcher.session().clone(),
        limit,
        extensions: run.options.extensions().to_vec(),
    };
    let mut pages = run.extractor.stream_media(&source, ctx);
    let mut fetched = 0_usize;

    loop {
        let next = tokio::select! {
            biased;
            () = run.token.cancelled() => return Err(QueryError::canceled(url)),
            next = pages.next() => next,
        };
        let Some(batch) = next else {
            debug!(pages = fetched, "Extractor exhausted");
            return Ok(());
        };
        let mut batch = batch.map_err(|source| QueryError::extractor(url, source))?;
        fetched += 1;

        if run.options.deep() {
            batch = expand(&run.dispatcher, run.extractor.host(), batch, &run.token).await;
        }
        if run.token.is_cancelled() {
            return Err(QueryError::canceled(url));
        }

        batch.retain(|media| media.matches_extensions(run.options.extensions()));
        let (added, total) = run.writer.merge(batch, limit);
        debug!(page = fetched, added, total, "Batch merged");
        run.emit(&Event::MediaQueried { amount: added });

        if total >= limit {
            debug!(limit, "Limit reached");
            return Ok(());
        }
    }
}
