//! Deep expansion of unknown-type descriptors.
//!
//! Best effort: a descriptor that cannot be resolved is kept unchanged.

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{Dispatcher, QueryOptions};
use crate::extractor::utils::has_host;
use crate::media::{Media, MediaType, merge_metadata};
use crate::pool::TaskPool;

/// Resolves every unknown-type descriptor of `batch` that lives outside
/// `origin_host` through a nested single-result query.
///
/// Positions in the batch are preserved. Same-host links are skipped so a
/// host can never expand into itself.
pub(crate) async fn expand(
    dispatcher: &Dispatcher,
    origin_host: &str,
    mut batch: Vec<Media>,
    token: &CancellationToken,
) -> Vec<Media> {
    let targets: Vec<(usize, Media)> = batch
        .iter()
        .enumerate()
        .filter(|(_, media)| media.media_type == MediaType::Unknown && !has_host(&media.url, origin_host))
        .map(|(index, media)| (index, media.clone()))
        .collect();
    if targets.is_empty() {
        return batch;
    }

    let pool = match TaskPool::with_token(dispatcher.expand_parallelism(), token.child_token()) {
        Ok(pool) => pool,
        Err(error) => {
            warn!(%error, "Expansion skipped");
            return batch;
        }
    };
    debug!(targets = targets.len(), parallelism = pool.parallelism(), "Expanding batch");

    let pool_token = pool.token().clone();
    let resolved = pool
        .run_ordered(targets, |(index, original)| {
            let dispatcher = dispatcher.clone();
            let token = pool_token.clone();
            async move {
                let resolved = resolve(&dispatcher, &original, &token).await;
                (index, resolved.map(|expanded| merge_metadata(&original, expanded)))
            }
        })
        .await;

    for (index, expanded) in resolved.into_iter().flatten() {
        if let Some(expanded) = expanded {
            batch[index] = expanded;
        }
    }
    batch
}

async fn resolve(dispatcher: &Dispatcher, original: &Media, token: &CancellationToken) -> Option<Media> {
    let options = QueryOptions::new().with_limit(1);
    let (response, _handle) = match dispatcher.query_nested(&original.url, options, token) {
        Ok(started) => started,
        Err(error) => {
            debug!(url = %original.url, %error, "Keeping unexpanded media");
            return None;
        }
    };

    if let Err(error) = response.wait().await {
        warn!(url = %original.url, %error, "Expansion failed, keeping original");
        return None;
    }
    let first = response.media().into_iter().next();
    if first.is_none() {
        debug!(url = %original.url, "Expansion found nothing, keeping original");
    }
    first
}
