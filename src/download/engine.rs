//! Resumable single-file download engine.
//!
//! Each request runs as its own task through these states:
//!
//! ```text
//! Init -> ProbeExisting -> Attempt(n) -> Success
//!                              |-> RetryBackoff -> Attempt(n+1)
//!                              '-> Fatal
//! ```
//!
//! - An existing destination file is resumed with a `Range` request from its
//!   current size; it is never truncated unless the server ignores the range.
//! - A `200` answer to a ranged request truncates the file and re-issues the
//!   same attempt without a range.
//! - `416` means the file on disk is already complete.
//! - `404`/`410` are fatal and never retried.
//! - Every other non-2xx status, every transport failure and every write
//!   failure mid-body consumes a retry, after a Fibonacci backoff sleep. Bytes
//!   already on disk are kept and the next attempt resumes from them.
//! - Failing to open, create or truncate the destination is fatal.
//!
//! The content hash covers the whole file: the on-disk prefix is hashed
//! before the resumed body.

use std::io::SeekFrom;

use futures_util::StreamExt;
use reqwest::Response;
use reqwest::header::CONTENT_RANGE;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::hash::ContentHasher;
use super::outcome::{DownloadOutcome, DownloadRequest, OutcomeWriter, UNKNOWN_SIZE};
use super::retry::RetryPolicy;
use super::{DownloadError, HttpClient};

const HASH_READ_BUFFER: usize = 64 * 1024;

/// How a single attempt ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttemptResult {
    /// The file is complete on disk.
    Complete,
    /// The server ignored the range; the file was truncated for a fresh start.
    RangeIgnored,
}

/// Runs resumable transfers with retry and hashing.
#[derive(Debug, Clone)]
pub struct DownloadEngine {
    client: HttpClient,
    retry: RetryPolicy,
}

impl DownloadEngine {
    /// Creates an engine issuing requests through `client`.
    #[must_use]
    pub fn new(client: HttpClient, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    /// Returns the retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Starts downloading `request` in the background.
    ///
    /// The returned outcome is live immediately. Must be called from within
    /// a Tokio runtime.
    #[must_use]
    pub fn download(&self, request: DownloadRequest) -> DownloadOutcome {
        self.start(request, CancellationToken::new())
    }

    /// Starts downloading `request`, canceling cooperatively when `token` fires.
    #[must_use]
    pub fn start(&self, request: DownloadRequest, token: CancellationToken) -> DownloadOutcome {
        let (outcome, writer) = DownloadOutcome::pending(request, token);
        let engine = self.clone();
        tokio::spawn(async move {
            let result = engine.transfer(&writer).await;
            match &result {
                Ok(()) => info!(
                    url = %writer.request().url,
                    path = %writer.request().path.display(),
                    "download complete"
                ),
                Err(error) if error.is_canceled() => {
                    debug!(url = %writer.request().url, "download canceled");
                }
                Err(error) => warn!(url = %writer.request().url, error = %error, "download failed"),
            }
            writer.finish(result);
        });
        outcome
    }

    #[instrument(skip(self, writer), fields(url = %writer.request().url))]
    async fn transfer(&self, writer: &OutcomeWriter) -> Result<(), DownloadError> {
        let request = writer.request();
        let token = writer.token();
        Url::parse(&request.url).map_err(|_| DownloadError::invalid_url(&request.url))?;

        let mut file = open_destination(request).await?;
        let mut offset = file
            .metadata()
            .await
            .map_err(|error| DownloadError::io(&request.path, error))?
            .len();
        writer.set_transferred(offset);
        debug!(offset, "probed existing destination");

        let mut retries_used = 0_u32;
        loop {
            if token.is_cancelled() {
                return Err(DownloadError::canceled(&request.url));
            }

            match self.attempt(&mut file, &mut offset, writer).await {
                Ok(AttemptResult::Complete) => return Ok(()),
                Ok(AttemptResult::RangeIgnored) => {
                    debug!("server ignored range request, restarting from zero");
                }
                Err(error) if error.is_transient() && self.retry.allows_retry(retries_used) => {
                    retries_used += 1;
                    let delay = self.retry.delay_before(retries_used);
                    warn!(
                        attempt = retries_used + 1,
                        url = %request.url,
                        error = %error,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "download attempt failed, retrying"
                    );
                    tokio::select! {
                        biased;
                        () = token.cancelled() => return Err(DownloadError::canceled(&request.url)),
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                Err(error) => return Err(error),
            }
        }
    }

    #[instrument(level = "debug", skip(self, file, writer), fields(offset = *offset))]
    async fn attempt(
        &self,
        file: &mut File,
        offset: &mut u64,
        writer: &OutcomeWriter,
    ) -> Result<AttemptResult, DownloadError> {
        let request = writer.request();
        let url = request.url.as_str();
        let response = tokio::select! {
            biased;
            () = writer.token().cancelled() => return Err(DownloadError::canceled(url)),
            response = self.client.get(url, Some(*offset)) => response?,
        };
        let status = response.status().as_u16();
        writer.set_status(status);
        debug!(status, "received response");

        match status {
            416 if *offset > 0 => {
                let hash = hash_prefix(file, *offset, request).await?;
                writer.set_total_size(to_signed(*offset));
                writer.set_transferred(*offset);
                writer.set_content_hash(hash.finalize_base91());
                debug!("requested range starts at end of file, already complete");
                return Ok(AttemptResult::Complete);
            }
            404 | 410 => return Err(DownloadError::not_found(url, status)),
            200 if *offset > 0 => {
                truncate(file, request).await?;
                *offset = 0;
                writer.set_transferred(0);
                writer.set_total_size(UNKNOWN_SIZE);
                return Ok(AttemptResult::RangeIgnored);
            }
            _ if !response.status().is_success() => {
                return Err(DownloadError::http_status(url, status));
            }
            _ => {}
        }

        let total = declared_total(&response, *offset);
        writer.set_total_size(total);

        let mut hasher = hash_prefix(file, *offset, request).await?;
        stream_body(response, file, offset, &mut hasher, writer).await?;

        if total == UNKNOWN_SIZE {
            writer.set_total_size(to_signed(*offset));
        }
        writer.set_transferred(*offset);
        writer.set_content_hash(hasher.finalize_base91());
        Ok(AttemptResult::Complete)
    }
}

async fn stream_body(
    response: Response,
    file: &mut File,
    offset: &mut u64,
    hasher: &mut ContentHasher,
    writer: &OutcomeWriter,
) -> Result<(), DownloadError> {
    let request = writer.request();
    let token = writer.token();
    let mut stream = response.bytes_stream();
    let mut written = 0_u64;

    while let Some(next) = stream.next().await {
        let failure = match next {
            Ok(chunk) => match file.write_all(&chunk).await {
                Ok(()) => {
                    hasher.update(&chunk);
                    written += chunk.len() as u64;
                    *offset += chunk.len() as u64;
                    writer.set_transferred(*offset);
                    None
                }
                Err(error) => Some(format!("write failed: {error}")),
            },
            Err(error) => Some(error.to_string()),
        };

        if let Some(reason) = failure {
            *offset = resume_offset(file, request).await?;
            writer.set_transferred(*offset);
            return Err(DownloadError::interrupted(&request.url, written, reason));
        }

        if token.is_cancelled() {
            sync_to_end(file, request).await?;
            return Err(DownloadError::canceled(&request.url));
        }
    }

    // Buffered writes may only report a full disk here.
    if let Err(error) = file.flush().await {
        *offset = resume_offset(file, request).await?;
        writer.set_transferred(*offset);
        return Err(DownloadError::interrupted(
            &request.url,
            written,
            format!("write failed: {error}"),
        ));
    }
    Ok(())
}

async fn open_destination(request: &DownloadRequest) -> Result<File, DownloadError> {
    if let Some(parent) = request.path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|error| DownloadError::io(parent, error))?;
    }
    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&request.path)
        .await
        .map_err(|error| DownloadError::io(&request.path, error))
}

/// Hashes the first `len` bytes of the file and leaves the cursor at `len`.
async fn hash_prefix(
    file: &mut File,
    len: u64,
    request: &DownloadRequest,
) -> Result<ContentHasher, DownloadError> {
    let io_error = |error| DownloadError::io(&request.path, error);
    let mut hasher = ContentHasher::new();
    file.seek(SeekFrom::Start(0)).await.map_err(io_error)?;

    let mut remaining = len;
    let mut buffer = vec![0_u8; HASH_READ_BUFFER];
    while remaining > 0 {
        let want = usize::try_from(remaining).map_or(buffer.len(), |r| r.min(buffer.len()));
        let read = file.read(&mut buffer[..want]).await.map_err(io_error)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        remaining -= read as u64;
    }

    file.seek(SeekFrom::Start(len)).await.map_err(io_error)?;
    Ok(hasher)
}

async fn truncate(file: &mut File, request: &DownloadRequest) -> Result<(), DownloadError> {
    let io_error = |error| DownloadError::io(&request.path, error);
    file.set_len(0).await.map_err(io_error)?;
    file.seek(SeekFrom::Start(0)).await.map_err(io_error)?;
    Ok(())
}

/// Flushes pending writes and returns the on-disk size.
async fn sync_to_end(file: &mut File, request: &DownloadRequest) -> Result<u64, DownloadError> {
    let io_error = |error| DownloadError::io(&request.path, error);
    file.flush().await.map_err(io_error)?;
    file.seek(SeekFrom::End(0)).await.map_err(io_error)
}

/// On-disk size after a failed write; the next attempt resumes from here.
async fn resume_offset(file: &mut File, request: &DownloadRequest) -> Result<u64, DownloadError> {
    if let Err(error) = file.flush().await {
        debug!(error = %error, "flush after failed write also failed");
    }
    file.seek(SeekFrom::End(0))
        .await
        .map_err(|error| DownloadError::io(&request.path, error))
}

/// Total file size from `Content-Range`, else `offset + Content-Length`.
fn declared_total(response: &Response, offset: u64) -> i64 {
    if let Some(total) = response
        .headers()
        .get(CONTENT_RANGE)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_content_range_total)
    {
        return to_signed(total);
    }
    response
        .content_length()
        .map_or(UNKNOWN_SIZE, |length| to_signed(offset.saturating_add(length)))
}

/// Parses the complete length out of `bytes 0-99/1234`.
fn parse_content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.trim().rsplit_once('/')?;
    total.trim().parse().ok()
}

fn to_signed(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
