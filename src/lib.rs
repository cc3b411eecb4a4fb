//! Mediagrab Core Library
//!
//! Turns a URL on a supported host into a deduplicated, limit-bounded list of
//! media descriptors, and downloads media with resume, retries and content
//! hashing.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`grabber`] - The [`Grabber`] façade tying everything together
//! - [`query`] - Streaming query protocol: dispatch, coordination, expansion
//! - [`extractor`] - Host-specific source adapters and their registry
//! - [`media`] - Media descriptors, dedup/merge, session metadata
//! - [`download`] - Resumable download engine and batch downloader
//! - [`pool`] - Bounded-parallelism task pool
//! - [`config`] - Configuration defaults and validation

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod completion;
pub mod config;
pub mod download;
pub mod extractor;
pub mod grabber;
pub mod media;
pub mod pool;
pub mod query;
mod user_agent;

// Re-export commonly used types
pub use config::{ConfigError, GrabberConfig};
pub use download::{
    BatchHandle, BatchOutcomes, DEFAULT_MAX_RETRIES, DEFAULT_PARALLELISM, DownloadEngine,
    DownloadError, DownloadOutcome, DownloadRequest, EngineError, HttpClient, RetryPolicy,
    TransferSnapshot,
};
pub use extractor::{Extractor, ExtractorError, ExtractorRegistry, SourceDescriptor, build_default_registry};
pub use grabber::Grabber;
pub use media::{Media, MediaType, Metadata};
pub use pool::{PoolError, TaskPool};
pub use query::{Event, QueryError, QueryHandle, QueryOptions, Response};
