//! Order-preserving dedup merge and limit truncation for media lists.
//!
//! These functions are pure: no I/O, no suspension points. The query
//! coordinator and media expansion both go through them.

use std::collections::HashSet;

use super::Media;

/// Merges `incoming` into `existing`, returning the merged list and the
/// number of newly added descriptors.
///
/// Descriptors are keyed by [`Media::identity`]; the first occurrence keeps
/// its position and later duplicates are dropped.
#[must_use]
pub fn merge_media(existing: &[Media], incoming: &[Media]) -> (Vec<Media>, usize) {
    let mut merged = existing.to_vec();
    let added = merge_into(&mut merged, incoming.iter().cloned());
    (merged, added)
}

/// In-place form of [`merge_media`]; returns the number of added descriptors.
pub fn merge_into(existing: &mut Vec<Media>, incoming: impl IntoIterator<Item = Media>) -> usize {
    let mut seen: HashSet<String> = HashSet::with_capacity(existing.len());
    // `existing` may itself hold duplicates if it was built by hand.
    existing.retain(|m| seen.insert(m.identity().to_string()));
    let base = existing.len();

    for media in incoming {
        if seen.insert(media.identity().to_string()) {
            existing.push(media);
        }
    }

    existing.len() - base
}

/// Truncates `media` to its first `limit` entries. Never re-orders.
pub fn truncate_to_limit(media: &mut Vec<Media>, limit: usize) {
    media.truncate(limit);
}

/// Copies the metadata of `original` onto `expanded`.
///
/// Keys from `original` win on conflict.
#[must_use]
pub fn merge_metadata(original: &Media, mut expanded: Media) -> Media {
    for (key, value) in &original.metadata {
        expanded.metadata.insert(key.clone(), value.clone());
    }
    expanded
}
