//! Grabber configuration with defaults and range validation.

use std::time::Duration;

use thiserror::Error;

use crate::download::constants::{CONNECT_TIMEOUT_SECS, DEFAULT_BACKOFF_UNIT, READ_TIMEOUT_SECS};
use crate::download::{ClientBuildError, ClientOptions, DEFAULT_MAX_RETRIES, MAX_RETRIES_LIMIT, RetryPolicy};
use crate::pool::{MAX_PARALLELISM, MIN_PARALLELISM};
use crate::user_agent;

/// Default number of concurrent nested queries during deep expansion.
pub const DEFAULT_EXPAND_PARALLELISM: usize = 5;

/// Largest accepted timeout, in seconds.
pub const MAX_TIMEOUT_SECS: u64 = 3600;

/// Errors raised by [`GrabberConfig::validate`] and grabber construction.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A numeric setting is outside its accepted range.
    #[error("invalid {field} value {value}. Expected range: {expected}")]
    OutOfRange {
        /// Name of the setting.
        field: &'static str,
        /// The rejected value, rendered.
        value: String,
        /// The accepted range, rendered.
        expected: &'static str,
    },

    /// The User-Agent is empty.
    #[error("user agent must not be empty\n  Suggestion: omit it to use the default")]
    EmptyUserAgent,

    /// The HTTP client could not be built from the settings.
    #[error(transparent)]
    Client(#[from] ClientBuildError),
}

impl ConfigError {
    fn out_of_range(field: &'static str, value: impl ToString, expected: &'static str) -> Self {
        Self::OutOfRange {
            field,
            value: value.to_string(),
            expected,
        }
    }
}

/// Settings shared by every query and download of a grabber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrabberConfig {
    /// Retries after the first attempt, for downloads and API fetches.
    pub max_retries: u32,
    /// Backoff unit; retry `n` waits `fib(n + 1)` units.
    pub backoff_unit: Duration,
    /// Concurrent nested queries during deep expansion.
    pub expand_parallelism: usize,
    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Whole-request read timeout in seconds.
    pub read_timeout_secs: u64,
    /// User-Agent sent with every request.
    pub user_agent: String,
    /// Extra headers sent with every request.
    pub headers: Vec<(String, String)>,
}

impl Default for GrabberConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_unit: DEFAULT_BACKOFF_UNIT,
            expand_parallelism: DEFAULT_EXPAND_PARALLELISM,
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            read_timeout_secs: READ_TIMEOUT_SECS,
            user_agent: user_agent::default_user_agent(),
            headers: Vec::new(),
        }
    }
}

impl GrabberConfig {
    /// Checks every setting against its accepted range.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(ConfigError::out_of_range("max_retries", self.max_retries, "0..=10"));
        }
        if self.backoff_unit.is_zero() {
            return Err(ConfigError::out_of_range(
                "backoff_unit",
                format!("{:?}", self.backoff_unit),
                "> 0",
            ));
        }
        if !(MIN_PARALLELISM..=MAX_PARALLELISM).contains(&self.expand_parallelism) {
            return Err(ConfigError::out_of_range(
                "expand_parallelism",
                self.expand_parallelism,
                "1..=100",
            ));
        }
        for (field, value) in [
            ("connect_timeout_secs", self.connect_timeout_secs),
            ("read_timeout_secs", self.read_timeout_secs),
        ] {
            if !(1..=MAX_TIMEOUT_SECS).contains(&value) {
                return Err(ConfigError::out_of_range(field, value, "1..=3600"));
            }
        }
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::EmptyUserAgent);
        }
        Ok(())
    }

    /// Returns the HTTP client settings.
    #[must_use]
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            user_agent: self.user_agent.clone(),
            headers: self.headers.clone(),
            connect_timeout_secs: self.connect_timeout_secs,
            read_timeout_secs: self.read_timeout_secs,
        }
    }

    /// Returns the retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.backoff_unit)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = GrabberConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.expand_parallelism, 5);
        assert_eq!(config.connect_timeout_secs, 30);
        assert_eq!(config.read_timeout_secs, 300);
        assert_eq!(config.retry_policy().max_attempts(), 3);
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let cases = [
            GrabberConfig {
                max_retries: 11,
                ..GrabberConfig::default()
            },
            GrabberConfig {
                backoff_unit: Duration::ZERO,
                ..GrabberConfig::default()
            },
            GrabberConfig {
                expand_parallelism: 0,
                ..GrabberConfig::default()
            },
            GrabberConfig {
                expand_parallelism: 101,
                ..GrabberConfig::default()
            },
            GrabberConfig {
                read_timeout_secs: 0,
                ..GrabberConfig::default()
            },
            GrabberConfig {
                connect_timeout_secs: 3601,
                ..GrabberConfig::default()
            },
        ];
        for config in cases {
            let error = config.validate().unwrap_err();
            assert!(
                matches!(error, ConfigError::OutOfRange { .. }),
                "unexpected error for {config:?}: {error}"
            );
        }
    }

    #[test]
    fn test_rejects_blank_user_agent() {
        let config = GrabberConfig {
            user_agent: "  ".to_string(),
            ..GrabberConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::EmptyUserAgent)));
    }

    #[test]
    fn test_client_options_carry_headers() {
        let config = GrabberConfig {
            headers: vec![("X-Test".to_string(), "1".to_string())],
            ..GrabberConfig::default()
        };
        let options = config.client_options();
        assert_eq!(options.headers, config.headers);
        assert_eq!(options.user_agent, config.user_agent);
    }
}
