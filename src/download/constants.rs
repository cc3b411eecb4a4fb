//! Constants for the download module (timeouts, backoff).

use std::time::Duration;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large files).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Default unit multiplied by the Fibonacci backoff factor (1 second).
pub const DEFAULT_BACKOFF_UNIT: Duration = Duration::from_secs(1);
