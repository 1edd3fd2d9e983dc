//! Reconnect policy and lifecycle hooks for client streams.

use std::{collections::HashSet, fmt};

use http::StatusCode;

use crate::error::SseError;

/// Decides whether a client stream keeps reconnecting, and observes its
/// connection lifecycle.
///
/// Hooks run on the stream's background task and must not block.
pub trait ReconnectHandler: Send + Sync + 'static {
    /// Determine whether the stream should reconnect after `error`.
    ///
    /// Returning `false` closes the stream. Default implementation returns
    /// `true` for all errors.
    fn should_reconnect(&self, _error: &SseError) -> bool {
        true
    }

    /// Called when a connection is established (or re-established).
    fn on_connect(&self) {}

    /// Called when an open connection is lost.
    fn on_disconnect(&self) {}
}

/// Reconnects after every error.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysReconnect;

impl ReconnectHandler for AlwaysReconnect {}

/// Stops reconnecting when the server answers with one of the given statuses.
///
/// # Example
///
/// ```rust
/// use hpx_eventsource::client::StopOnStatus;
/// use http::StatusCode;
///
/// let handler = StopOnStatus::new([StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct StopOnStatus {
    statuses: HashSet<StatusCode>,
}

impl StopOnStatus {
    /// Stop on any of `statuses`.
    pub fn new(statuses: impl IntoIterator<Item = StatusCode>) -> Self {
        Self {
            statuses: statuses.into_iter().collect(),
        }
    }
}

impl ReconnectHandler for StopOnStatus {
    fn should_reconnect(&self, error: &SseError) -> bool {
        error
            .status()
            .is_none_or(|status| !self.statuses.contains(&status))
    }
}

/// Reconnect policy backed by a closure. See [`reconnect_fn`].
pub struct ReconnectFn<F> {
    f: F,
}

impl<F> fmt::Debug for ReconnectFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconnectFn").finish_non_exhaustive()
    }
}

impl<F> ReconnectHandler for ReconnectFn<F>
where
    F: Fn(&SseError) -> bool + Send + Sync + 'static,
{
    fn should_reconnect(&self, error: &SseError) -> bool {
        (self.f)(error)
    }
}

/// Build a [`ReconnectHandler`] from a predicate.
///
/// ```rust
/// use hpx_eventsource::client::reconnect_fn;
///
/// let handler = reconnect_fn(|err| err.is_transport());
/// ```
pub fn reconnect_fn<F>(f: F) -> ReconnectFn<F>
where
    F: Fn(&SseError) -> bool + Send + Sync + 'static,
{
    ReconnectFn { f }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use http::{HeaderMap, HeaderValue, header::WWW_AUTHENTICATE};

    use super::*;

    fn status(code: StatusCode) -> SseError {
        SseError::invalid_status(code, HeaderMap::new())
    }

    #[test]
    fn always_reconnect() {
        let handler = AlwaysReconnect;
        assert!(handler.should_reconnect(&status(StatusCode::UNAUTHORIZED)));
        assert!(handler.should_reconnect(&SseError::timeout(Duration::from_secs(1))));
    }

    #[test]
    fn stop_on_status() {
        let handler = StopOnStatus::new([StatusCode::UNAUTHORIZED]);
        assert!(!handler.should_reconnect(&status(StatusCode::UNAUTHORIZED)));
        assert!(handler.should_reconnect(&status(StatusCode::SERVICE_UNAVAILABLE)));
        assert!(handler.should_reconnect(&SseError::timeout(Duration::from_secs(1))));
    }

    #[test]
    fn closure_policy() {
        let handler = reconnect_fn(|err: &SseError| err.is_transport());
        assert!(handler.should_reconnect(&SseError::timeout(Duration::from_secs(1))));
        assert!(!handler.should_reconnect(&status(StatusCode::NOT_FOUND)));
    }

    #[test]
    fn closure_policy_sees_response_headers() {
        // Give up only when the server asks for credentials we do not have.
        let handler = reconnect_fn(|err: &SseError| {
            err.response_headers()
                .is_none_or(|h| !h.contains_key(WWW_AUTHENTICATE))
        });

        let mut challenge = HeaderMap::new();
        challenge.insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        assert!(!handler.should_reconnect(&SseError::invalid_status(
            StatusCode::UNAUTHORIZED,
            challenge
        )));
        assert!(handler.should_reconnect(&status(StatusCode::UNAUTHORIZED)));
    }
}
