//! Media descriptors: the unit that flows through queries and downloads.
//!
//! A [`Media`] is created by an extractor for every file it discovers. The
//! file extension and [`MediaType`] are derived from the URL path at creation
//! time; the open-ended metadata map carries extractor-specific details such
//! as author or creation time.

pub mod merge;
pub mod session;

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

pub use merge::{merge_media, merge_metadata, merge_into, truncate_to_limit};
pub use session::{Metadata, SessionStore};

/// Per-descriptor metadata (author, creation time, source subtype, ...).
pub type MediaMetadata = HashMap<String, Value>;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "avif"];
const VIDEO_EXTENSIONS: &[&str] = &["gifv", "mp4", "m4v", "webm", "mkv"];

/// Broad classification of a media file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaType {
    /// Still or animated image.
    Image,
    /// Video file.
    Video,
    /// Extension not recognized; may be resolved by deep expansion.
    Unknown,
}

impl MediaType {
    /// Classifies a lowercase file extension.
    #[must_use]
    pub fn from_extension(extension: &str) -> Self {
        if IMAGE_EXTENSIONS.contains(&extension) {
            Self::Image
        } else if VIDEO_EXTENSIONS.contains(&extension) {
            Self::Video
        } else {
            Self::Unknown
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Image => "Image",
            Self::Video => "Video",
            Self::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

/// A discovered media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Media {
    /// Location of the file.
    pub url: String,
    /// Lowercase extension derived from the URL path, without the dot.
    pub extension: String,
    /// Classification derived from the extension.
    pub media_type: MediaType,
    /// Kind of the extractor that produced this descriptor.
    pub extractor: String,
    /// Extractor-specific details.
    pub metadata: MediaMetadata,
}

impl Media {
    /// Creates a descriptor, deriving extension and type from `url`.
    #[must_use]
    pub fn new(url: impl Into<String>, extractor: impl Into<String>, metadata: MediaMetadata) -> Self {
        let url = url.into();
        let extension = extension_from_url(&url);
        let media_type = MediaType::from_extension(&extension);
        Self {
            url,
            extension,
            media_type,
            extractor: extractor.into(),
            metadata,
        }
    }

    /// Returns the dedup identity of this descriptor.
    ///
    /// Two descriptors are the same file when their URLs match after the
    /// query string and fragment are removed.
    #[must_use]
    pub fn identity(&self) -> &str {
        identity_of(&self.url)
    }

    /// Returns true when the extension is in `extensions` (case-insensitive).
    ///
    /// An empty filter accepts everything.
    #[must_use]
    pub fn matches_extensions(&self, extensions: &[String]) -> bool {
        extensions.is_empty()
            || extensions
                .iter()
                .any(|ext| ext.trim_start_matches('.').eq_ignore_ascii_case(&self.extension))
    }
}

impl fmt::Display for Media {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{url: {}, extension: {}, type: {}, extractor: {}}}",
            self.url, self.extension, self.media_type, self.extractor
        )
    }
}

/// Derives the lowercase file extension from a URL's path.
///
/// Returns an empty string for URLs that fail to parse or have no extension.
#[must_use]
pub fn extension_from_url(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return String::new();
    };
    Path::new(parsed.path())
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

fn identity_of(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}
