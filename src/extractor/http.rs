//! JSON fetch helper shared by extractors.
//!
//! Requests go through the grabber's [`HttpClient`](crate::download::HttpClient)
//! so they carry the configured User-Agent, headers and timeouts. Transient
//! failures are retried with the same Fibonacci [`RetryPolicy`] used for
//! downloads.

use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use super::{ExtractorContext, ExtractorError};
use crate::download::RetryPolicy;

/// Fetches `url` and deserializes its JSON body, retrying transient failures.
///
/// `bearer` adds an `Authorization: Bearer` header.
///
/// # Errors
///
/// Returns the last [`ExtractorError`] once retries are exhausted, or
/// immediately for non-transient failures.
#[instrument(skip(ctx, bearer), fields(authorized = bearer.is_some()))]
pub async fn fetch_json<T: DeserializeOwned>(
    ctx: &ExtractorContext,
    url: &str,
    bearer: Option<&str>,
) -> Result<T, ExtractorError> {
    fetch_json_with(ctx.http.inner(), ctx.retry, url, bearer).await
}

async fn fetch_json_with<T: DeserializeOwned>(
    client: &reqwest::Client,
    retry: RetryPolicy,
    url: &str,
    bearer: Option<&str>,
) -> Result<T, ExtractorError> {
    let mut retries_used = 0_u32;
    loop {
        match fetch_once(client, url, bearer).await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_transient() && retry.allows_retry(retries_used) => {
                retries_used += 1;
                let delay = retry.delay_before(retries_used);
                warn!(
                    attempt = retries_used + 1,
                    url,
                    error = %error,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "extractor request failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(error) => return Err(error),
        }
    }
}

async fn fetch_once<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    bearer: Option<&str>,
) -> Result<T, ExtractorError> {
    let mut request = client.get(url).header(ACCEPT, "application/json");
    if let Some(token) = bearer {
        request = request.bearer_auth(token);
    }

    let response = request
        .send()
        .await
        .map_err(|error| ExtractorError::network(url, error))?;
    let status = response.status();
    if !status.is_success() {
        return Err(ExtractorError::http_status(url, status.as_u16()));
    }

    let body = response
        .bytes()
        .await
        .map_err(|error| ExtractorError::network(url, error))?;
    debug!(url, bytes = body.len(), "fetched extractor JSON");
    serde_json::from_slice(&body).map_err(|error| ExtractorError::invalid_response(url, error.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use serde::Deserialize;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Payload {
        value: u32,
    }

    fn fast_retry(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_fetch_json_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"value": 7}"#))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let payload: Payload = fetch_json_with(&client, fast_retry(2), &format!("{}/api", server.uri()), None)
            .await
            .unwrap();
        assert_eq!(payload, Payload { value: 7 });
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_json_does_not_retry_client_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let error = fetch_json_with::<Payload>(&client, fast_retry(3), &format!("{}/api", server.uri()), None)
            .await
            .unwrap_err();
        assert!(matches!(error, ExtractorError::HttpStatus { status: 403, .. }));
    }

    #[tokio::test]
    async fn test_fetch_json_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"value": 1}"#))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let payload: Payload = fetch_json_with(&client, fast_retry(0), &format!("{}/api", server.uri()), Some("secret"))
            .await
            .unwrap();
        assert_eq!(payload.value, 1);
    }

    #[tokio::test]
    async fn test_fetch_json_reports_invalid_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let error = fetch_json_with::<Payload>(&client, fast_retry(2), &format!("{}/api", server.uri()), None)
            .await
            .unwrap_err();
        assert!(matches!(error, ExtractorError::InvalidResponse { .. }));
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }
}
