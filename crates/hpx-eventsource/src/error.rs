//! Error handling for the client stream and the broadcast hub.

use std::time::Duration;

use thiserror::Error;

use crate::codec::DecodeError;

/// The main result type used throughout the crate.
pub type SseResult<T> = Result<T, SseError>;

/// Everything that can go wrong while subscribing to or serving a stream.
///
/// On the client side every variant except [`SseError::InvalidUrl`],
/// [`SseError::InvalidHeader`] and [`SseError::Config`] is delivered on the
/// stream's error sequence and followed by a reconnect, unless the
/// [`ReconnectHandler`](crate::client::ReconnectHandler) decides to stop.
#[derive(Error, Debug)]
pub enum SseError {
    /// HTTP transport errors (connection refused, DNS failure, ...)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The event stream failed or ended while open.
    #[error("Stream error: {0}")]
    Decode(#[from] DecodeError<reqwest::Error>),

    /// The server answered with something other than `200 OK`.
    ///
    /// Carries the response headers so a reconnect handler can look at
    /// `WWW-Authenticate`, `Retry-After` and the like.
    #[error("Unexpected status: {status}")]
    InvalidStatus {
        status: http::StatusCode,
        headers: Box<http::HeaderMap>,
    },

    /// The server answered with a content type other than `text/event-stream`.
    #[error("Unexpected content type: {content_type}")]
    InvalidContentType { content_type: String },

    /// Too many redirects while connecting.
    #[error("Stopped after {limit} redirects")]
    RedirectLimit { limit: usize },

    /// A redirect response could not be followed.
    #[error("Invalid redirect: {message}")]
    InvalidRedirect { message: String },

    /// The URL could not be parsed.
    #[error("Invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    /// A header value could not be encoded.
    #[error("Invalid header value: {message}")]
    InvalidHeader { message: String },

    /// Connecting took longer than the configured timeout.
    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The hub was closed.
    #[error("Server closed")]
    ServerClosed,
}

impl SseError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a non-200 status error.
    pub fn invalid_status(status: http::StatusCode, headers: http::HeaderMap) -> Self {
        Self::InvalidStatus {
            status,
            headers: Box::new(headers),
        }
    }

    /// Create a content type error.
    pub fn invalid_content_type(content_type: impl Into<String>) -> Self {
        Self::InvalidContentType {
            content_type: content_type.into(),
        }
    }

    /// Create a redirect error.
    pub fn invalid_redirect(message: impl Into<String>) -> Self {
        Self::InvalidRedirect {
            message: message.into(),
        }
    }

    /// Create a URL error.
    pub fn invalid_url(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a header error.
    pub fn invalid_header(message: impl Into<String>) -> Self {
        Self::InvalidHeader {
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout { duration }
    }

    /// The HTTP status that caused this error, if any.
    pub fn status(&self) -> Option<http::StatusCode> {
        match self {
            Self::InvalidStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Headers of the rejected response, for [`SseError::InvalidStatus`].
    pub fn response_headers(&self) -> Option<&http::HeaderMap> {
        match self {
            Self::InvalidStatus { headers, .. } => Some(&**headers),
            _ => None,
        }
    }

    /// Returns `true` for network-level failures, including a dropped stream.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Http(_)
                | Self::Timeout { .. }
                | Self::Decode(DecodeError::Transport(_) | DecodeError::EndOfStream)
        )
    }

    /// Returns `true` if the redirect limit was hit.
    pub fn is_redirect_limit(&self) -> bool {
        matches!(self, Self::RedirectLimit { .. })
    }
}
