//! Client stream configuration.

use std::time::Duration;

/// Upper bound on redirects followed while connecting.
pub const MAX_REDIRECTS: usize = 10;

/// Largest accepted [`ClientConfig::max_retry_delay`].
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Configuration for client streams.
///
/// Provides sensible defaults and chainable setter methods.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Initial reconnection interval, replaced at runtime by any `retry:`
    /// field the server sends.
    pub retry: Duration,
    /// Maximum delay between reconnection attempts.
    pub max_retry_delay: Duration,
    /// Backoff multiplier applied per consecutive failed connect.
    pub backoff_factor: f64,
    /// Random jitter factor (0.0–1.0) for reconnection delays.
    pub jitter: f64,
    /// Timeout for each connection attempt, redirects included.
    pub connect_timeout: Duration,
    /// Number of redirects followed before giving up.
    pub max_redirects: usize,
    /// Additional HTTP headers to include with every request.
    pub headers: http::HeaderMap,
    /// Return the first connection error from `subscribe` instead of
    /// retrying in the background.
    pub fail_fast: bool,
    /// Reject responses whose content type is not `text/event-stream`.
    pub validate_content_type: bool,
    /// Capacity of the error channel; errors beyond it are dropped.
    pub error_channel_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            retry: Duration::from_secs(3),
            max_retry_delay: Duration::from_secs(60),
            backoff_factor: 2.0,
            jitter: 0.0,
            connect_timeout: Duration::from_secs(10),
            max_redirects: MAX_REDIRECTS,
            headers: http::HeaderMap::new(),
            fail_fast: false,
            validate_content_type: false,
            error_channel_capacity: 16,
        }
    }
}

impl ClientConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial reconnection interval.
    #[must_use]
    pub fn retry(mut self, retry: Duration) -> Self {
        self.retry = retry;
        self
    }

    /// Set the maximum reconnection delay.
    #[must_use]
    pub fn max_retry_delay(mut self, delay: Duration) -> Self {
        self.max_retry_delay = delay;
        self
    }

    /// Set the reconnection backoff factor.
    #[must_use]
    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Set the reconnection jitter factor.
    #[must_use]
    pub fn jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the redirect limit.
    #[must_use]
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }

    /// Set additional HTTP headers.
    #[must_use]
    pub fn headers(mut self, headers: http::HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Set whether the first connection error is returned from `subscribe`.
    #[must_use]
    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Set whether the response content type is checked.
    #[must_use]
    pub fn validate_content_type(mut self, validate: bool) -> Self {
        self.validate_content_type = validate;
        self
    }

    /// Set the error channel capacity.
    #[must_use]
    pub fn error_channel_capacity(mut self, capacity: usize) -> Self {
        self.error_channel_capacity = capacity;
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error message string if any field has an invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.retry.is_zero() {
            return Err("Retry interval must be > 0".to_string());
        }
        if self.max_retry_delay < self.retry {
            return Err("Max retry delay must be >= retry interval".to_string());
        }
        if self.max_retry_delay > MAX_RETRY_DELAY {
            return Err("Max retry delay must be <= 24h".to_string());
        }
        if self.backoff_factor < 1.0 || !self.backoff_factor.is_finite() {
            return Err("Backoff factor must be >= 1.0".to_string());
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err("Jitter must be between 0.0 and 1.0".to_string());
        }
        if self.connect_timeout.is_zero() {
            return Err("Connect timeout must be > 0".to_string());
        }
        if self.max_redirects > MAX_REDIRECTS {
            return Err(format!("Max redirects must be <= {MAX_REDIRECTS}"));
        }
        if self.error_channel_capacity == 0 {
            return Err("Error channel capacity must be > 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.retry, Duration::from_secs(3));
        assert_eq!(config.max_retry_delay, Duration::from_secs(60));
        assert_eq!(config.backoff_factor, 2.0);
        assert_eq!(config.jitter, 0.0);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.max_redirects, 10);
        assert!(config.headers.is_empty());
        assert!(!config.fail_fast);
        assert!(!config.validate_content_type);
        assert_eq!(config.error_channel_capacity, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_all_builder_methods() {
        let mut headers = http::HeaderMap::new();
        headers.insert("X-Api-Key", "test-key".parse().expect("valid header value"));

        let config = ClientConfig::new()
            .retry(Duration::from_millis(500))
            .max_retry_delay(Duration::from_secs(120))
            .backoff_factor(1.5)
            .jitter(0.2)
            .connect_timeout(Duration::from_secs(15))
            .max_redirects(3)
            .headers(headers)
            .fail_fast(true)
            .validate_content_type(true)
            .error_channel_capacity(4);

        assert_eq!(config.retry, Duration::from_millis(500));
        assert_eq!(config.max_retry_delay, Duration::from_secs(120));
        assert_eq!(config.backoff_factor, 1.5);
        assert_eq!(config.jitter, 0.2);
        assert_eq!(config.connect_timeout, Duration::from_secs(15));
        assert_eq!(config.max_redirects, 3);
        assert_eq!(
            config
                .headers
                .get("X-Api-Key")
                .map(|v| v.to_str().expect("valid str")),
            Some("test-key")
        );
        assert!(config.fail_fast);
        assert!(config.validate_content_type);
        assert_eq!(config.error_channel_capacity, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_zero_retry() {
        let config = ClientConfig::new().retry(Duration::ZERO);
        assert_eq!(
            config.validate().expect_err("should fail"),
            "Retry interval must be > 0"
        );
    }

    #[test]
    fn test_validation_max_below_retry() {
        let config = ClientConfig::new()
            .retry(Duration::from_secs(10))
            .max_retry_delay(Duration::from_secs(1));
        assert_eq!(
            config.validate().expect_err("should fail"),
            "Max retry delay must be >= retry interval"
        );
    }

    #[test]
    fn test_validation_invalid_backoff() {
        let config = ClientConfig::new().backoff_factor(0.5);
        assert_eq!(
            config.validate().expect_err("should fail"),
            "Backoff factor must be >= 1.0"
        );
    }

    #[test]
    fn test_validation_invalid_jitter() {
        for jitter in [-0.1, 1.5] {
            let config = ClientConfig::new().jitter(jitter);
            assert_eq!(
                config.validate().expect_err("should fail"),
                "Jitter must be between 0.0 and 1.0"
            );
        }
    }

    #[test]
    fn test_validation_redirects_and_channels() {
        assert_eq!(
            ClientConfig::new()
                .max_redirects(11)
                .validate()
                .expect_err("should fail"),
            "Max redirects must be <= 10"
        );
        assert_eq!(
            ClientConfig::new()
                .error_channel_capacity(0)
                .validate()
                .expect_err("should fail"),
            "Error channel capacity must be > 0"
        );
        assert_eq!(
            ClientConfig::new()
                .connect_timeout(Duration::ZERO)
                .validate()
                .expect_err("should fail"),
            "Connect timeout must be > 0"
        );
    }

    #[test]
    fn test_validation_unbounded_max_retry_delay() {
        let config = ClientConfig::new().max_retry_delay(Duration::MAX);
        assert_eq!(
            config.validate().expect_err("should fail"),
            "Max retry delay must be <= 24h"
        );
        assert!(
            ClientConfig::new()
                .max_retry_delay(MAX_RETRY_DELAY)
                .validate()
                .is_ok()
        );
    }
}
