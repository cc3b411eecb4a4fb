//! Retry policy with Fibonacci backoff for transient failures.
//!
//! The same policy drives download attempts and extractor JSON fetches.
//! With `max_retries = R` an operation gets at most `R + 1` attempts; the
//! delay before retry `n` (1-based) is `fib(n + 1)` backoff units, so with a
//! one-second unit the schedule is 1s, 2s, 3s, 5s, 8s, ...
//!
//! There is no jitter.

use std::time::Duration;

use tracing::{debug, instrument};

use super::constants::DEFAULT_BACKOFF_UNIT;

/// Default maximum retry count (attempts = retries + 1).
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Largest accepted retry count.
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Retry configuration shared by downloads and extractor requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_unit: DEFAULT_BACKOFF_UNIT,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with `max_retries` retries and the given backoff unit.
    ///
    /// Values above [`MAX_RETRIES_LIMIT`] are clamped.
    #[must_use]
    pub fn new(max_retries: u32, backoff_unit: Duration) -> Self {
        Self {
            max_retries: max_retries.min(MAX_RETRIES_LIMIT),
            backoff_unit,
        }
    }

    /// Creates a policy with a custom retry count and the default unit.
    #[must_use]
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self::new(max_retries, DEFAULT_BACKOFF_UNIT)
    }

    /// Returns the configured retry count.
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns the total number of attempts, including the first.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Returns the backoff unit.
    #[must_use]
    pub fn backoff_unit(&self) -> Duration {
        self.backoff_unit
    }

    /// Returns true if another attempt is allowed after `retries_used` retries.
    #[must_use]
    pub fn allows_retry(&self, retries_used: u32) -> bool {
        retries_used < self.max_retries
    }

    /// Returns the delay before retry number `retry` (1-based).
    ///
    /// Retry 0 is the first attempt and never waits.
    #[must_use]
    #[instrument(level = "trace", skip(self))]
    pub fn delay_before(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let factor = fibonacci(retry + 1);
        let delay = self
            .backoff_unit
            .saturating_mul(u32::try_from(factor).unwrap_or(u32::MAX));
        debug!(retry, factor, delay_ms = delay.as_millis(), "computed backoff delay");
        delay
    }
}

/// Returns the `n`th Fibonacci number with `fib(1) = fib(2) = 1`.
fn fibonacci(n: u32) -> u64 {
    let (mut a, mut b) = (0_u64, 1_u64);
    for _ in 0..n {
        (a, b) = (b, a.saturating_add(b));
    }
    a
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_fibonacci_sequence() {
        let values: Vec<u64> = (0..=8).map(fibonacci).collect();
        assert_eq!(values, vec![0, 1, 1, 2, 3, 5, 8, 13, 21]);
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries(), 2);
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.backoff_unit(), Duration::from_secs(1));
    }

    #[test]
    fn test_backoff_schedule_is_fibonacci_seconds() {
        let policy = RetryPolicy::with_max_retries(3);
        assert_eq!(policy.delay_before(0), Duration::ZERO);
        assert_eq!(policy.delay_before(1), Duration::from_secs(1));
        assert_eq!(policy.delay_before(2), Duration::from_secs(2));
        assert_eq!(policy.delay_before(3), Duration::from_secs(3));
        assert_eq!(policy.delay_before(4), Duration::from_secs(5));
    }

    #[test]
    fn test_backoff_scales_with_unit() {
        let policy = RetryPolicy::new(3, Duration::from_millis(10));
        assert_eq!(policy.delay_before(3), Duration::from_millis(30));
    }

    #[test]
    fn test_zero_retries_allows_single_attempt() {
        let policy = RetryPolicy::with_max_retries(0);
        assert_eq!(policy.max_attempts(), 1);
        assert!(!policy.allows_retry(0));
    }

    #[test]
    fn test_allows_retry_until_exhausted() {
        let policy = RetryPolicy::with_max_retries(2);
        assert!(policy.allows_retry(0));
        assert!(policy.allows_retry(1));
        assert!(!policy.allows_retry(2));
    }

    #[test]
    fn test_max_retries_clamped() {
        assert_eq!(RetryPolicy::with_max_retries(50).max_retries(), MAX_RETRIES_LIMIT);
    }
}
