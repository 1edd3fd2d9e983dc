//! Broadcast hub configuration.

use std::time::Duration;

/// Configuration for a [`Server`](super::Server).
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Frames buffered per subscriber before it is disconnected as too slow.
    pub subscriber_queue_capacity: usize,
    /// Interval between heartbeat comments on an idle subscription
    /// (`None` disables heartbeats).
    pub heartbeat_interval: Option<Duration>,
    /// Text of the heartbeat comment line.
    pub heartbeat_comment: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            subscriber_queue_capacity: 64,
            heartbeat_interval: Some(Duration::from_secs(15)),
            heartbeat_comment: String::new(),
        }
    }
}

impl ServerConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-subscriber queue capacity.
    #[must_use]
    pub fn subscriber_queue_capacity(mut self, capacity: usize) -> Self {
        self.subscriber_queue_capacity = capacity;
        self
    }

    /// Set or disable the heartbeat interval.
    #[must_use]
    pub fn heartbeat_interval(mut self, interval: Option<Duration>) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Set the heartbeat comment text.
    #[must_use]
    pub fn heartbeat_comment(mut self, comment: impl Into<String>) -> Self {
        self.heartbeat_comment = comment.into();
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error message string if any field has an invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.subscriber_queue_capacity == 0 {
            return Err("Subscriber queue capacity must be > 0".to_string());
        }
        if self.heartbeat_interval.is_some_and(|i| i.is_zero()) {
            return Err("Heartbeat interval must be > 0".to_string());
        }
        if self.heartbeat_comment.contains(['\r', '\n']) {
            return Err("Heartbeat comment must be a single line".to_string());
        }
        Ok(())
    }
}
