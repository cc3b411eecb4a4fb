//! Integration tests for the streaming query protocol.
//!
//! Stub extractors stand in for real hosts so the coordinator's limit,
//! cancellation, failure and expansion behavior can be pinned exactly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::stream;
use mediagrab_core::extractor::{ExtractorContext, MediaStream};
use mediagrab_core::media::MediaMetadata;
use mediagrab_core::{
    Event, Extractor, ExtractorError, ExtractorRegistry, Grabber, GrabberConfig, Media, MediaType,
    QueryError, QueryOptions, SourceDescriptor,
};
use serde_json::json;

type Page = Result<Vec<Media>, ExtractorError>;

/// In-memory extractor serving fixed pages.
struct Stub {
    kind: &'static str,
    host: &'static str,
    pages: Vec<Page>,
    repeat_last: bool,
    delay: Duration,
    classify_fails: bool,
    fetched: Arc<AtomicUsize>,
}

impl Stub {
    fn new(kind: &'static str, host: &'static str, pages: Vec<Page>) -> Self {
        Self {
            kind,
            host,
            pages,
            repeat_last: false,
            delay: Duration::ZERO,
            classify_fails: false,
            fetched: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Extractor for Stub {
    fn kind(&self) -> &'static str {
        self.kind
    }

    fn host(&self) -> &str {
        self.host
    }

    fn classify_source(&self, url: &str) -> Result<SourceDescriptor, ExtractorError> {
        if self.classify_fails {
            return Err(ExtractorError::source_not_found(url, self.kind));
        }
        Ok(SourceDescriptor::new("user", "someone"))
    }

    fn stream_media(&self, _source: &SourceDescriptor, ctx: ExtractorContext) -> MediaStream {
        let pages = self.pages.clone();
        let repeat_last = self.repeat_last;
        let delay = self.delay;
        let fetched = Arc::clone(&self.fetched);
        ctx.session.insert_if_absent(self.kind, "token", json!("secret"));

        Box::pin(stream::unfold(0_usize, move |index| {
            let page = pages
                .get(index)
                .or_else(|| if repeat_last { pages.last() } else { None })
                .cloned();
            let fetched = Arc::clone(&fetched);
            async move {
                let page = page?;
                tokio::time::sleep(delay).await;
                fetched.fetch_add(1, Ordering::SeqCst);
                Some((page, index + 1))
            }
        }))
    }
}

fn media(url: &str, kind: &str) -> Media {
    Media::new(url, kind, MediaMetadata::new())
}

fn page(prefix: &str, count: usize) -> Page {
    Ok((0..count)
        .map(|i| media(&format!("https://cdn.stub.test/{prefix}-{i}.jpg"), "Stub"))
        .collect())
}

fn grabber_with(extractors: Vec<Stub>) -> Grabber {
    let mut registry = ExtractorRegistry::new();
    for extractor in extractors {
        registry.register(Arc::new(extractor));
    }
    Grabber::new(GrabberConfig::default()).unwrap().with_registry(registry)
}

const URL: &str = "https://stub.test/user/someone";

#[tokio::test]
async fn test_limit_one_returns_exactly_one() {
    let grabber = grabber_with(vec![Stub::new("Stub", "stub.test", vec![page("a", 5)])]);
    let (response, _handle) = grabber.query(URL, QueryOptions::new().with_limit(1)).unwrap();

    response.wait().await.unwrap();
    assert_eq!(response.len(), 1);
    assert_eq!(response.media()[0].url, "https://cdn.stub.test/a-0.jpg");
    assert_eq!(response.extractor(), "Stub");
    assert_eq!(response.url(), URL);
}

#[tokio::test]
async fn test_limit_stops_fetching_pages() {
    let mut stub = Stub::new("Stub", "stub.test", (0..10).map(|p| page(&p.to_string(), 25)).collect());
    let fetched = Arc::clone(&stub.fetched);
    stub.repeat_last = true;
    let grabber = grabber_with(vec![stub]);

    let (response, _handle) = grabber.query(URL, QueryOptions::new().with_limit(50)).unwrap();
    response.wait().await.unwrap();

    assert_eq!(response.len(), 50);
    assert_eq!(fetched.load(Ordering::SeqCst), 2, "exactly two pages of 25 are needed");
}

#[tokio::test]
async fn test_limit_truncates_inside_a_page() {
    let grabber = grabber_with(vec![Stub::new("Stub", "stub.test", vec![page("a", 25), page("b", 25)])]);
    let (response, _handle) = grabber.query(URL, QueryOptions::new().with_limit(30)).unwrap();

    response.wait().await.unwrap();
    let urls: Vec<String> = response.media().into_iter().map(|m| m.url).collect();
    assert_eq!(urls.len(), 30);
    assert_eq!(urls[24], "https://cdn.stub.test/a-24.jpg");
    assert_eq!(urls[29], "https://cdn.stub.test/b-4.jpg");
}

#[tokio::test]
async fn test_exhausted_pages_complete_below_limit() {
    let grabber = grabber_with(vec![Stub::new(
        "Stub",
        "stub.test",
        vec![page("a", 10), Ok(Vec::new()), page("b", 10)],
    )]);
    let (response, _handle) = grabber.query(URL, QueryOptions::new().with_limit(100)).unwrap();

    response.wait().await.unwrap();
    assert_eq!(response.len(), 20);
    assert!(response.is_complete());
}

#[tokio::test]
async fn test_duplicates_across_pages_are_merged() {
    let duplicate = Ok(vec![
        media("https://cdn.stub.test/a-1.jpg?size=large", "Stub"),
        media("https://cdn.stub.test/new.jpg", "Stub"),
    ]);
    let grabber = grabber_with(vec![Stub::new("Stub", "stub.test", vec![page("a", 3), duplicate])]);
    let (response, _handle) = grabber.query(URL, QueryOptions::new()).unwrap();

    response.wait().await.unwrap();
    let urls: Vec<String> = response.media().into_iter().map(|m| m.url).collect();
    assert_eq!(
        urls,
        vec![
            "https://cdn.stub.test/a-0.jpg",
            "https://cdn.stub.test/a-1.jpg",
            "https://cdn.stub.test/a-2.jpg",
            "https://cdn.stub.test/new.jpg",
        ]
    );
}

#[tokio::test]
async fn test_zero_limit_completes_empty() {
    let stub = Stub::new("Stub", "stub.test", vec![page("a", 5)]);
    let fetched = Arc::clone(&stub.fetched);
    let grabber = grabber_with(vec![stub]);
    let (response, _handle) = grabber.query(URL, QueryOptions::new().with_limit(0)).unwrap();

    response.wait().await.unwrap();
    assert!(response.is_empty());
    assert_eq!(fetched.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unclaimed_url_fails_synchronously() {
    let grabber = grabber_with(vec![Stub::new("Stub", "stub.test", vec![])]);
    let error = grabber
        .query("https://elsewhere.test/x", QueryOptions::new())
        .unwrap_err();
    assert!(matches!(error, QueryError::NoExtractor { .. }), "unexpected error: {error}");
}

#[tokio::test]
async fn test_classification_failure_is_terminal() {
    let mut stub = Stub::new("Stub", "stub.test", vec![page("a", 5)]);
    stub.classify_fails = true;
    let fetched = Arc::clone(&stub.fetched);
    let grabber = grabber_with(vec![stub]);

    let (response, _handle) = grabber.query(URL, QueryOptions::new()).unwrap();
    let error = response.wait().await.unwrap_err();

    assert!(matches!(error, QueryError::SourceClassification { .. }), "unexpected error: {error}");
    assert!(response.is_empty());
    assert_eq!(fetched.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_extractor_error_keeps_partial_results() {
    let grabber = grabber_with(vec![Stub::new(
        "Stub",
        "stub.test",
        vec![
            page("a", 4),
            Err(ExtractorError::http_status("https://stub.test/api", 503)),
            page("b", 4),
        ],
    )]);
    let (response, _handle) = grabber.query(URL, QueryOptions::new()).unwrap();

    let error = response.wait().await.unwrap_err();
    assert!(matches!(error, QueryError::Extractor { .. }), "unexpected error: {error}");
    assert_eq!(response.len(), 4, "merged results survive the failure");
    assert!(matches!(response.result(), Some(Err(QueryError::Extractor { .. }))));
}

#[tokio::test]
async fn test_cancel_ends_query_with_canceled() {
    let mut stub = Stub::new("Stub", "stub.test", vec![page("a", 2)]);
    stub.repeat_last = true;
    stub.delay = Duration::from_millis(100);
    let grabber = grabber_with(vec![stub]);

    let (response, handle) = grabber.query(URL, QueryOptions::new()).unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;
    handle.cancel();

    let error = tokio::time::timeout(Duration::from_secs(2), response.wait())
        .await
        .expect("cancel should end the query")
        .unwrap_err();
    assert!(error.is_canceled(), "unexpected error: {error}");
    assert!(handle.is_cancelled());
    assert_eq!(response.len(), 2, "the repeated page dedups to two items");
}

#[tokio::test]
async fn test_extension_filter_applies_to_merged_media() {
    let mixed = Ok(vec![
        media("https://cdn.stub.test/a.jpg", "Stub"),
        media("https://cdn.stub.test/b.MP4", "Stub"),
        media("https://cdn.stub.test/c.gif", "Stub"),
    ]);
    let grabber = grabber_with(vec![Stub::new("Stub", "stub.test", vec![mixed])]);
    let (response, _handle) = grabber
        .query(URL, QueryOptions::new().with_extensions(["mp4", ".GIF"]))
        .unwrap();

    response.wait().await.unwrap();
    let urls: Vec<String> = response.media().into_iter().map(|m| m.url).collect();
    assert_eq!(urls, vec!["https://cdn.stub.test/b.MP4", "https://cdn.stub.test/c.gif"]);
}

fn expansion_grabber() -> Grabber {
    let mut link_metadata = MediaMetadata::new();
    link_metadata.insert("name".to_string(), json!("origin"));
    link_metadata.insert("author".to_string(), json!("poster"));

    let origin = Stub::new(
        "Origin",
        "stub.test",
        vec![Ok(vec![
            Media::new("https://resolver.test/watch/abc", "Origin", link_metadata),
            media("https://stub.test/comments/self", "Origin"),
            media("https://broken.test/watch/zzz", "Origin"),
            media("https://cdn.stub.test/plain.jpg", "Origin"),
        ])],
    );

    let mut resolved_metadata = MediaMetadata::new();
    resolved_metadata.insert("name".to_string(), json!("resolved"));
    resolved_metadata.insert("id".to_string(), json!("abc"));
    let resolver = Stub::new(
        "Resolver",
        "resolver.test",
        vec![Ok(vec![
            Media::new("https://media.resolver.test/abc.mp4", "Resolver", resolved_metadata),
            media("https://media.resolver.test/other.mp4", "Resolver"),
        ])],
    );

    let mut broken = Stub::new("Broken", "broken.test", vec![]);
    broken.classify_fails = true;

    grabber_with(vec![origin, resolver, broken])
}

#[tokio::test]
async fn test_deep_expansion_resolves_foreign_unknown_media() {
    let grabber = expansion_grabber();
    let (response, _handle) = grabber.query(URL, QueryOptions::new().with_deep(true)).unwrap();

    response.wait().await.unwrap();
    let media = response.media();
    assert_eq!(media.len(), 4);

    let resolved = &media[0];
    assert_eq!(resolved.url, "https://media.resolver.test/abc.mp4");
    assert_eq!(resolved.media_type, MediaType::Video);
    assert_eq!(resolved.extractor, "Resolver");
    assert_eq!(resolved.metadata["name"], json!("origin"), "original keys win");
    assert_eq!(resolved.metadata["author"], json!("poster"));
    assert_eq!(resolved.metadata["id"], json!("abc"));

    assert_eq!(media[1].url, "https://stub.test/comments/self", "same-host links are not expanded");
    assert_eq!(media[2].url, "https://broken.test/watch/zzz", "failed expansion keeps the original");
    assert_eq!(media[2].media_type, MediaType::Unknown);
    assert_eq!(media[3].url, "https://cdn.stub.test/plain.jpg");
}

#[tokio::test]
async fn test_shallow_query_keeps_unknown_media() {
    let grabber = expansion_grabber();
    let (response, _handle) = grabber.query(URL, QueryOptions::new()).unwrap();

    response.wait().await.unwrap();
    assert_eq!(response.media()[0].url, "https://resolver.test/watch/abc");
    assert_eq!(response.media()[0].media_type, MediaType::Unknown);
}

#[tokio::test]
async fn test_events_follow_query_lifecycle() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let grabber = expansion_grabber().with_event_handler(move |event: &Event| sink.lock().unwrap().push(event.clone()));

    let (response, _handle) = grabber.query(URL, QueryOptions::new().with_deep(true)).unwrap();
    response.wait().await.unwrap();

    let events = events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            Event::ExtractorFound {
                name: "Origin".to_string()
            },
            Event::SourceFound {
                kind: "user".to_string(),
                name: "someone".to_string()
            },
            Event::MediaQueried { amount: 4 },
            Event::QueryCompleted { total: 4 },
        ],
        "nested expansion queries must not emit events"
    );
}

#[tokio::test]
async fn test_session_metadata_is_exposed_and_reusable() {
    let grabber = grabber_with(vec![Stub::new("Stub", "stub.test", vec![page("a", 1)])]);
    let (response, _handle) = grabber.query(URL, QueryOptions::new()).unwrap();
    response.wait().await.unwrap();

    let metadata = response.metadata();
    assert_eq!(metadata["Stub"]["token"], json!("secret"));

    let mut seeded = metadata.clone();
    seeded.get_mut("Stub").unwrap().insert("token".to_string(), json!("saved"));
    let restored = grabber.with_metadata(seeded);
    let (response, _handle) = restored.query(URL, QueryOptions::new()).unwrap();
    response.wait().await.unwrap();
    assert_eq!(
        response.metadata()["Stub"]["token"],
        json!("saved"),
        "seeded values win over later writers"
    );
}

#[tokio::test]
async fn test_track_reports_final_total() {
    let mut stub = Stub::new("Stub", "stub.test", vec![page("a", 3), page("b", 3)]);
    stub.delay = Duration::from_millis(120);
    let grabber = grabber_with(vec![stub]);
    let (response, _handle) = grabber.query(URL, QueryOptions::new()).unwrap();

    let mut added_sum = 0;
    let mut last_total = 0;
    response
        .track(|added, total| {
            added_sum += added;
            last_total = total;
        })
        .await
        .unwrap();
    assert_eq!(last_total, 6);
    assert_eq!(added_sum, 6);
}
