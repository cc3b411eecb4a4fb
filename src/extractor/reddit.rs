//! Reddit extractor: single submissions, user timelines and subreddits.
//!
//! Listing pages are fetched from the public JSON API 100 posts at a time,
//! following the `after` cursor until it runs out. Gallery posts expand into
//! one descriptor per valid gallery item; hosted videos use their fallback
//! URL.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use futures_util::stream;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use super::http::fetch_json;
use super::utils::{capture, compile_static_regex};
use super::{Extractor, ExtractorContext, ExtractorError, MediaStream, SourceDescriptor, retain_requested};
use crate::media::{Media, MediaMetadata};

/// Kind tag of this extractor.
pub const KIND: &str = "Reddit";

/// Host suffix served by this extractor.
pub const HOST: &str = "reddit.com";

const DEFAULT_BASE_URL: &str = "https://www.reddit.com";
const PAGE_SIZE: usize = 100;

/// Source kind for a single post.
pub const SOURCE_SUBMISSION: &str = "submission";
/// Source kind for a user's submissions.
pub const SOURCE_USER: &str = "user";
/// Source kind for a subreddit's hot listing.
pub const SOURCE_SUBREDDIT: &str = "subreddit";

static SUBMISSION_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"/(?:r|u|user)/([^/?]+)/comments/([^/\n?]+)"));
static USER_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"/(?:u|user)/([^/\n?]+)"));
static SUBREDDIT_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"/r/([^/\n?]+)"));

/// Extractor for `reddit.com` URLs.
#[derive(Debug, Clone)]
pub struct Reddit {
    base_url: String,
}

impl Default for Reddit {
    fn default() -> Self {
        Self::new()
    }
}

impl Reddit {
    /// Creates an extractor talking to the public Reddit API.
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Creates an extractor talking to `base_url` instead of reddit.com.
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl Extractor for Reddit {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn host(&self) -> &str {
        HOST
    }

    fn classify_source(&self, url: &str) -> Result<SourceDescriptor, ExtractorError> {
        if let Some(caps) = SUBMISSION_RE.captures(url) {
            let name = caps.get(1).map_or("", |m| m.as_str());
            let id = caps.get(2).map_or("", |m| m.as_str());
            return Ok(SourceDescriptor::new(SOURCE_SUBMISSION, name).with_field("id", id));
        }
        if let Some(name) = capture(&USER_RE, url, 1) {
            return Ok(SourceDescriptor::new(SOURCE_USER, name));
        }
        if let Some(name) = capture(&SUBREDDIT_RE, url, 1) {
            return Ok(SourceDescriptor::new(SOURCE_SUBREDDIT, name));
        }
        Err(ExtractorError::source_not_found(url, KIND))
    }

    #[instrument(skip(self, ctx), fields(source = %source))]
    fn stream_media(&self, source: &SourceDescriptor, ctx: ExtractorContext) -> MediaStream {
        let base = self.base_url.clone();
        let name = source.name().to_string();
        match source.kind() {
            SOURCE_SUBMISSION => {
                let id = source.field("id").unwrap_or_default().to_string();
                let url = format!("{base}/comments/{id}.json?raw_json=1");
                submission_stream(ctx, source.clone(), url)
            }
            SOURCE_USER => listing_stream(ctx, source.clone(), move |after| {
                format!(
                    "{base}/user/{name}/submitted.json?sort=new&raw_json=1&after={after}&limit={PAGE_SIZE}"
                )
            }),
            _ => listing_stream(ctx, source.clone(), move |after| {
                format!("{base}/r/{name}/hot.json?raw_json=1&after={after}&limit={PAGE_SIZE}")
            }),
        }
    }
}

fn submission_stream(ctx: ExtractorContext, source: SourceDescriptor, url: String) -> MediaStream {
    Box::pin(stream::once(async move {
        let listings: Vec<Listing> = fetch_json(&ctx, &url, None).await?;
        let listing = listings
            .into_iter()
            .next()
            .ok_or_else(|| ExtractorError::invalid_response(&url, "empty submission listing"))?;
        Ok(posts_to_media(listing.data.children, &source, &ctx.extensions))
    }))
}

fn listing_stream<F>(ctx: ExtractorContext, source: SourceDescriptor, page_url: F) -> MediaStream
where
    F: Fn(&str) -> String + Send + 'static,
{
    // State is the next `after` cursor; `None` once pages run out.
    Box::pin(stream::unfold(Some(String::new()), move |cursor| {
        let ctx = ctx.clone();
        let source = source.clone();
        let url = cursor.as_deref().map(&page_url);
        async move {
            let url = url?;
            match fetch_json::<Listing>(&ctx, &url, None).await {
                Ok(listing) => {
                    let next = listing.data.after.filter(|after| !after.is_empty());
                    debug!(url, posts = listing.data.children.len(), more = next.is_some(), "fetched listing page");
                    let media = posts_to_media(listing.data.children, &source, &ctx.extensions);
                    Some((Ok(media), next))
                }
                Err(error) => Some((Err(error), None)),
            }
        }
    }))
}

fn posts_to_media(children: Vec<Child>, source: &SourceDescriptor, extensions: &[String]) -> Vec<Media> {
    let mut media = Vec::new();
    for child in children {
        let post = child.data;
        if post.is_gallery {
            for url in post.gallery_urls() {
                media.push(new_media(url, &post, source));
            }
        } else if let Some(url) = post.primary_url() {
            media.push(new_media(url, &post, source));
        }
    }
    retain_requested(media, extensions)
}

fn new_media(url: String, post: &Post, source: &SourceDescriptor) -> Media {
    let mut metadata = MediaMetadata::new();
    metadata.insert("source".to_string(), json!(source.kind().to_lowercase()));
    metadata.insert("name".to_string(), json!(source.name()));
    metadata.insert("created".to_string(), json!(post.created));
    if !post.author.is_empty() {
        metadata.insert("author".to_string(), json!(post.author));
    }
    Media::new(url, KIND, metadata)
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    after: Option<String>,
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Post,
}

#[derive(Debug, Default, Deserialize)]
struct Post {
    #[serde(default)]
    author: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    created: f64,
    #[serde(default)]
    is_gallery: bool,
    #[serde(default)]
    media_metadata: Option<BTreeMap<String, Value>>,
    #[serde(default)]
    gallery_data: Option<GalleryData>,
    #[serde(default)]
    secure_media: Option<SecureMedia>,
}

#[derive(Debug, Deserialize)]
struct GalleryData {
    #[serde(default)]
    items: Vec<GalleryEntry>,
}

#[derive(Debug, Deserialize)]
struct GalleryEntry {
    media_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct GalleryItem {
    #[serde(default)]
    status: String,
    #[serde(default)]
    s: Option<GallerySource>,
}

#[derive(Debug, Default, Deserialize)]
struct GallerySource {
    #[serde(default)]
    u: Option<String>,
    #[serde(default)]
    gif: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SecureMedia {
    #[serde(default)]
    reddit_video: Option<RedditVideo>,
}

#[derive(Debug, Deserialize)]
struct RedditVideo {
    #[serde(default)]
    fallback_url: Option<String>,
}

impl Post {
    fn primary_url(&self) -> Option<String> {
        self.secure_media
            .as_ref()
            .and_then(|m| m.reddit_video.as_ref())
            .and_then(|v| v.fallback_url.clone())
            .filter(|url| !url.is_empty())
            .or_else(|| self.url.clone().filter(|url| !url.is_empty()))
    }

    /// Valid gallery items, in gallery order when Reddit provides one.
    fn gallery_urls(&self) -> Vec<String> {
        let Some(items) = &self.media_metadata else {
            return Vec::new();
        };
        let ordered: Vec<&str> = match &self.gallery_data {
            Some(gallery) if !gallery.items.is_empty() => {
                gallery.items.iter().map(|entry| entry.media_id.as_str()).collect()
            }
            _ => items.keys().map(String::as_str).collect(),
        };

        ordered
            .into_iter()
            .filter_map(|id| items.get(id))
            .filter_map(|raw| serde_json::from_value::<GalleryItem>(raw.clone()).ok())
            .filter(|item| item.status == "valid")
            .filter_map(|item| {
                let source = item.s?;
                source.u.filter(|u| !u.is_empty()).or(source.gif)
            })
            .filter(|url| !url.is_empty())
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::media::MediaType;

    #[test]
    fn test_classify_submission() {
        let source = Reddit::new()
            .classify_source("https://www.reddit.com/r/pics/comments/1bxsmnr/some_title/")
            .unwrap();
        assert_eq!(source.kind(), SOURCE_SUBMISSION);
        assert_eq!(source.name(), "pics");
        assert_eq!(source.field("id"), Some("1bxsmnr"));
    }

    #[test]
    fn test_classify_user() {
        for url in [
            "https://www.reddit.com/user/someone/",
            "https://www.reddit.com/u/someone",
            "https://old.reddit.com/user/someone/submitted/?sort=new",
        ] {
            let source = Reddit::new().classify_source(url).unwrap();
            assert_eq!(source.kind(), SOURCE_USER, "{url}");
            assert_eq!(source.name(), "someone", "{url}");
        }
    }

    #[test]
    fn test_classify_subreddit() {
        let source = Reddit::new()
            .classify_source("https://www.reddit.com/r/EarthPorn/")
            .unwrap();
        assert_eq!(source.kind(), SOURCE_SUBREDDIT);
        assert_eq!(source.name(), "EarthPorn");
    }

    #[test]
    fn test_classify_unknown_fails() {
        let error = Reddit::new()
            .classify_source("https://www.reddit.com/settings")
            .unwrap_err();
        assert!(matches!(error, ExtractorError::SourceNotFound { .. }));
    }

    #[test]
    fn test_matches_host() {
        let reddit = Reddit::new();
        assert!(reddit.matches("https://www.reddit.com/r/pics"));
        assert!(!reddit.matches("https://www.redgifs.com/watch/abc"));
    }

    #[test]
    fn test_posts_to_media_prefers_video_fallback() {
        let children: Vec<Child> = serde_json::from_value(json!([
            {"data": {
                "author": "poster",
                "url": "https://v.redd.it/abc",
                "created": 1_700_000_000.0,
                "secure_media": {"reddit_video": {"fallback_url": "https://v.redd.it/abc/DASH_720.mp4?source=fallback"}}
            }},
            {"data": {"author": "poster", "url": "https://i.redd.it/img.jpg", "created": 1.0}}
        ]))
        .unwrap();
        let source = SourceDescriptor::new(SOURCE_USER, "poster");
        let media = posts_to_media(children, &source, &[]);
        assert_eq!(media.len(), 2);
        assert_eq!(media[0].url, "https://v.redd.it/abc/DASH_720.mp4?source=fallback");
        assert_eq!(media[0].media_type, MediaType::Video);
        assert_eq!(media[0].metadata["source"], json!("user"));
        assert_eq!(media[0].metadata["name"], json!("poster"));
        assert_eq!(media[1].media_type, MediaType::Image);
    }

    #[test]
    fn test_gallery_expands_valid_items_in_order() {
        let children: Vec<Child> = serde_json::from_value(json!([
            {"data": {
                "author": "poster",
                "is_gallery": true,
                "gallery_data": {"items": [{"media_id": "b"}, {"media_id": "a"}, {"media_id": "c"}]},
                "media_metadata": {
                    "a": {"status": "valid", "s": {"u": "https://i.redd.it/a.jpg"}},
                    "b": {"status": "valid", "s": {"gif": "https://i.redd.it/b.gif"}},
                    "c": {"status": "failed"}
                }
            }}
        ]))
        .unwrap();
        let source = SourceDescriptor::new(SOURCE_SUBMISSION, "pics");
        let media = posts_to_media(children, &source, &[]);
        let urls: Vec<&str> = media.iter().map(|m| m.url.as_str()).collect();
        assert_eq!(urls, vec!["https://i.redd.it/b.gif", "https://i.redd.it/a.jpg"]);
    }

    #[test]
    fn test_extension_filter_keeps_unknown_for_expansion() {
        let children: Vec<Child> = serde_json::from_value(json!([
            {"data": {"url": "https://i.redd.it/a.jpg"}},
            {"data": {"url": "https://i.redd.it/b.mp4"}},
            {"data": {"url": "https://www.redgifs.com/watch/abc"}}
        ]))
        .unwrap();
        let source = SourceDescriptor::new(SOURCE_SUBREDDIT, "pics");
        let media = posts_to_media(children, &source, &["mp4".to_string()]);
        let urls: Vec<&str> = media.iter().map(|m| m.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://i.redd.it/b.mp4", "https://www.redgifs.com/watch/abc"]
        );
    }
}
