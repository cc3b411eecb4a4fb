//! Destination paths for downloaded media.

use std::collections::HashSet;
use std::path::Path;

use mediagrab_core::{DownloadRequest, Media};
use url::Url;

/// Builds one download request per descriptor inside `output_dir`.
///
/// Files are named after the last URL path segment; colliding or missing
/// names fall back to `media-<n>` with the descriptor's extension.
pub(crate) fn plan_downloads(media: &[Media], output_dir: &Path) -> Vec<DownloadRequest> {
    let mut taken = HashSet::new();
    media
        .iter()
        .enumerate()
        .map(|(index, media)| {
            let name = file_name(media)
                .filter(|name| !taken.contains(name))
                .unwrap_or_else(|| fallback_name(media, index));
            taken.insert(name.clone());
            DownloadRequest::new(media.url.clone(), output_dir.join(name))
        })
        .collect()
}

fn file_name(media: &Media) -> Option<String> {
    let url = Url::parse(&media.url).ok()?;
    let segment = url.path_segments()?.next_back()?;
    let name: String = segment
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let trimmed = name.trim_matches('.');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn fallback_name(media: &Media, index: usize) -> String {
    if media.extension.is_empty() {
        format!("media-{}", index + 1)
    } else {
        format!("media-{}.{}", index + 1, media.extension)
    }
}
