//! Reconnect delay schedule.

use std::time::Duration;

use rand::Rng;

use crate::client::ClientConfig;

/// Delay schedule for one client stream.
///
/// Seeded with the stream's retry interval, which the server may replace
/// through a `retry:` field at any time. Each consecutive failure multiplies
/// the delay by the backoff factor, capped at the larger of the configured
/// maximum and the current retry interval. A successful open starts over.
#[derive(Clone, Debug)]
pub(crate) struct Backoff {
    retry: Duration,
    max_delay: Duration,
    factor: f64,
    jitter: f64,
    failures: u32,
}

impl Backoff {
    pub(crate) fn new(config: &ClientConfig) -> Self {
        Self {
            retry: config.retry,
            max_delay: config.max_retry_delay,
            factor: config.backoff_factor,
            jitter: config.jitter,
            failures: 0,
        }
    }

    /// Replace the retry interval. Zero is ignored.
    pub(crate) fn set_retry(&mut self, retry: Duration) -> bool {
        if retry.is_zero() || retry == self.retry {
            return false;
        }
        self.retry = retry;
        true
    }

    /// Forget earlier failures after a successful open.
    pub(crate) fn reset(&mut self) {
        self.failures = 0;
    }

    /// Consecutive failures recorded since the last reset.
    pub(crate) fn failures(&self) -> u32 {
        self.failures
    }

    /// Delay before the next attempt, recording one more failure.
    pub(crate) fn next_delay(&mut self) -> Duration {
        let ceiling = self.max_delay.max(self.retry);
        let scaled = self.retry.as_secs_f64() * self.factor.powf(f64::from(self.failures));
        // Overflow and infinity both land on the ceiling.
        let base = Duration::try_from_secs_f64(scaled).map_or(ceiling, |d| d.min(ceiling));
        self.failures = self.failures.saturating_add(1);

        if self.jitter == 0.0 {
            return base;
        }
        let keep = 1.0 - self.jitter * rand::rng().random_range(0.0..=1.0);
        Duration::try_from_secs_f64(base.as_secs_f64() * keep).map_or(base, |d| d.min(base))
    }
}
