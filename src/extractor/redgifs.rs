//! RedGifs extractor: single videos and user collections.
//!
//! Every API call needs a temporary bearer token. The token is cached in the
//! session metadata under `RedGifs.token`; concurrent expansion tasks may race
//! to fetch one, and the first stored token wins. A `401` drops the cached
//! token and the request is repeated once with a freshly issued one.

use std::sync::LazyLock;

use futures_util::stream;
use regex::Regex;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use super::http::fetch_json;
use super::utils::{capture, compile_static_regex};
use super::{Extractor, ExtractorContext, ExtractorError, MediaStream, SourceDescriptor, retain_requested};
use crate::media::{Media, MediaMetadata};

/// Kind tag of this extractor.
pub const KIND: &str = "RedGifs";

/// Host suffix served by this extractor.
pub const HOST: &str = "redgifs.com";

/// Session metadata key holding the bearer token.
pub const TOKEN_KEY: &str = "token";

const DEFAULT_API_URL: &str = "https://api.redgifs.com";
const PAGE_SIZE: usize = 100;

/// Source kind for a single video.
pub const SOURCE_VIDEO: &str = "video";
/// Source kind for a user's uploads.
pub const SOURCE_USER: &str = "user";

static VIDEO_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"/(ifr|watch)/([^/\n?]+)"));
static USER_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"/users/([^/\n?]+)"));

/// Extractor for `redgifs.com` URLs.
#[derive(Debug, Clone)]
pub struct RedGifs {
    api_url: String,
}

impl Default for RedGifs {
    fn default() -> Self {
        Self::new()
    }
}

impl RedGifs {
    /// Creates an extractor talking to the public RedGifs API.
    #[must_use]
    pub fn new() -> Self {
        Self::with_api_url(DEFAULT_API_URL)
    }

    /// Creates an extractor talking to `api_url` instead of api.redgifs.com.
    #[must_use]
    pub fn with_api_url(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl Extractor for RedGifs {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn host(&self) -> &str {
        HOST
    }

    fn classify_source(&self, url: &str) -> Result<SourceDescriptor, ExtractorError> {
        if let Some(id) = capture(&VIDEO_RE, url, 2) {
            return Ok(SourceDescriptor::new(SOURCE_VIDEO, id));
        }
        if let Some(name) = capture(&USER_RE, url, 1) {
            return Ok(SourceDescriptor::new(SOURCE_USER, name));
        }
        Err(ExtractorError::source_not_found(url, KIND))
    }

    #[instrument(skip(self, ctx), fields(source = %source))]
    fn stream_media(&self, source: &SourceDescriptor, ctx: ExtractorContext) -> MediaStream {
        let api = self.api_url.clone();
        let source = source.clone();
        if source.kind() == SOURCE_VIDEO {
            video_stream(ctx, api, source)
        } else {
            user_stream(ctx, api, source)
        }
    }
}

/// Returns the cached bearer token, issuing and caching a new one if absent.
async fn session_token(ctx: &ExtractorContext, api: &str) -> Result<String, ExtractorError> {
    if let Some(Value::String(token)) = ctx.session.get(KIND, TOKEN_KEY) {
        debug!("Reusing RedGifs token");
        return Ok(token);
    }

    debug!("Issuing new RedGifs token");
    let auth: Auth = fetch_json(ctx, &format!("{api}/v2/auth/temporary"), None).await?;
    let stored = ctx
        .session
        .insert_if_absent(KIND, TOKEN_KEY, Value::String(auth.token.clone()));
    Ok(stored.as_str().map_or(auth.token, str::to_string))
}

/// Fetches `url` with `token`, replacing an expired token once on `401`.
async fn fetch_authorized<T: DeserializeOwned>(
    ctx: &ExtractorContext,
    api: &str,
    url: &str,
    token: &mut String,
) -> Result<T, ExtractorError> {
    match fetch_json(ctx, url, Some(token.as_str())).await {
        Err(ExtractorError::HttpStatus { status: 401, .. }) => {
            debug!("RedGifs token rejected, issuing a new one");
            ctx.session.invalidate(KIND, TOKEN_KEY, &Value::String(token.clone()));
            *token = session_token(ctx, api).await?;
            fetch_json(ctx, url, Some(token.as_str())).await
        }
        result => result,
    }
}

fn video_stream(ctx: ExtractorContext, api: String, source: SourceDescriptor) -> MediaStream {
    Box::pin(stream::once(async move {
        let mut token = session_token(&ctx, &api).await?;
        let url = format!("{api}/v2/gifs/{}", source.name().to_ascii_lowercase());
        let video: VideoResponse = fetch_authorized(&ctx, &api, &url, &mut token).await?;
        Ok(gifs_to_media(vec![video.gif], &source, &ctx.extensions))
    }))
}

enum UserCursor {
    Start,
    Page { token: String, page: u64, last: u64 },
    Done,
}

fn user_stream(ctx: ExtractorContext, api: String, source: SourceDescriptor) -> MediaStream {
    let max_pages = u64::try_from(ctx.limit.div_ceil(PAGE_SIZE)).unwrap_or(u64::MAX);

    Box::pin(stream::unfold(UserCursor::Start, move |cursor| {
        let ctx = ctx.clone();
        let api = api.clone();
        let source = source.clone();
        async move {
            let (mut token, page, last) = match cursor {
                UserCursor::Done => return None,
                UserCursor::Page { token, page, last } => (token, page, Some(last)),
                UserCursor::Start => match session_token(&ctx, &api).await {
                    Ok(token) => (token, 1, None),
                    Err(error) => return Some((Err(error), UserCursor::Done)),
                },
            };

            let url = format!(
                "{api}/v2/users/{}/search?order=new&count={PAGE_SIZE}&page={page}",
                source.name().to_ascii_lowercase()
            );
            match fetch_authorized::<UserResponse>(&ctx, &api, &url, &mut token).await {
                Ok(response) => {
                    let last = last.unwrap_or_else(|| response.pages.min(max_pages));
                    debug!(page, last, gifs = response.gifs.len(), "fetched user page");
                    let next = if page < last {
                        UserCursor::Page {
                            token,
                            page: page + 1,
                            last,
                        }
                    } else {
                        UserCursor::Done
                    };
                    Some((Ok(gifs_to_media(response.gifs, &source, &ctx.extensions)), next))
                }
                Err(error) => Some((Err(error), UserCursor::Done)),
            }
        }
    }))
}

fn gifs_to_media(gifs: Vec<Gif>, source: &SourceDescriptor, extensions: &[String]) -> Vec<Media> {
    let media = gifs
        .into_iter()
        .filter_map(|gif| {
            let url = gif.urls.hd.filter(|u| !u.is_empty()).or(gif.urls.sd)?;
            let mut metadata = MediaMetadata::new();
            metadata.insert("name".to_string(), json!(gif.user_name));
            metadata.insert("source".to_string(), json!(source.kind().to_lowercase()));
            metadata.insert("created".to_string(), json!(gif.create_date));
            metadata.insert("id".to_string(), json!(gif.id));
            Some(Media::new(url, KIND, metadata))
        })
        .collect();
    retain_requested(media, extensions)
}

#[derive(Debug, Deserialize)]
struct Auth {
    token: String,
}

#[derive(Debug, Deserialize)]
struct VideoResponse {
    gif: Gif,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    #[serde(default)]
    gifs: Vec<Gif>,
    #[serde(default)]
    pages: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Gif {
    #[serde(default)]
    id: String,
    #[serde(default)]
    user_name: String,
    #[serde(default)]
    urls: GifUrls,
    #[serde(default)]
    create_date: i64,
}

#[derive(Debug, Default, Deserialize)]
struct GifUrls {
    #[serde(default)]
    hd: Option<String>,
    #[serde(default)]
    sd: Option<String>,
}
