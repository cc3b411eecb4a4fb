//! Resumable, retrying, integrity-checked file downloads.
//!
//! # Features
//!
//! - Streaming transfers written straight to disk
//! - HTTP byte-range resume of partially written files
//! - Fibonacci-second retry backoff for transient failures
//! - Whole-file SHA-256 content hash in base-91 text form
//! - Live progress counters observable while the transfer runs
//! - Bounded-parallelism batches with aggregate cancellation
//!
//! # Example
//!
//! ```no_run
//! use mediagrab_core::download::{DownloadEngine, DownloadRequest, HttpClient, RetryPolicy};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = DownloadEngine::new(HttpClient::new()?, RetryPolicy::default());
//! let outcome = engine.download(DownloadRequest::new(
//!     "https://example.com/clip.mp4",
//!     "./downloads/clip.mp4",
//! ));
//! outcome.wait().await?;
//! println!("hash: {:?}", outcome.content_hash());
//! # Ok(())
//! # }
//! ```

mod batch;
mod client;
pub mod constants;
mod engine;
mod error;
pub mod hash;
mod outcome;
mod retry;

pub use batch::{BatchHandle, BatchOutcomes, DEFAULT_PARALLELISM, EngineError};
pub use client::{ClientBuildError, ClientOptions, HttpClient};
pub use engine::DownloadEngine;
pub use error::DownloadError;
pub use outcome::{DownloadOutcome, DownloadRequest, TransferSnapshot, UNKNOWN_SIZE};
pub use retry::{DEFAULT_MAX_RETRIES, MAX_RETRIES_LIMIT, RetryPolicy};
