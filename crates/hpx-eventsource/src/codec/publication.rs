//! Concrete decoded event, following the
//! [HTML Living Standard](https://html.spec.whatwg.org/multipage/server-sent-events.html).

use core::time::Duration;
use std::borrow::Cow;

use bytes_utils::Str;

use super::constants::EMPTY_STR;
use crate::event::Event;

/// Event with immutable fields, as produced by a
/// [`Decoder`](super::decoder::Decoder).
///
/// Also usable as a ready-made [`Event`] for publishing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Publication {
    /// The event identifier (empty when the frame carried none).
    pub id: Str,
    /// The event type field (empty when unspecified, meaning `message`).
    pub event: Str,
    /// The data payload.
    pub data: Str,
    /// Reconnection interval advertised by the server.
    pub retry: Option<Duration>,
}

impl Default for Publication {
    fn default() -> Self {
        Self {
            id: EMPTY_STR,
            event: EMPTY_STR,
            data: EMPTY_STR,
            retry: None,
        }
    }
}

impl Publication {
    /// Create a publication carrying only a payload.
    #[must_use]
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: Str::from(data.into()),
            ..Default::default()
        }
    }

    /// Set the identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Str::from(id.into());
        self
    }

    /// Set the event type.
    #[must_use]
    pub fn with_event_type(mut self, event: impl Into<String>) -> Self {
        self.event = Str::from(event.into());
        self
    }

    /// Set the advertised retry interval.
    #[must_use]
    pub fn with_retry(mut self, retry: Duration) -> Self {
        self.retry = Some(retry);
        self
    }
}

impl Event for Publication {
    fn id(&self) -> &str {
        &self.id
    }

    fn event_type(&self) -> &str {
        &self.event
    }

    fn data(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.data)
    }

    fn retry(&self) -> Option<Duration> {
        self.retry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let publication = Publication::new("hello")
            .with_id("7")
            .with_event_type("greeting")
            .with_retry(Duration::from_millis(250));

        assert_eq!(publication.id(), "7");
        assert_eq!(publication.event_type(), "greeting");
        assert_eq!(publication.data(), "hello");
        assert_eq!(publication.retry(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn default_is_anonymous_message() {
        let publication = Publication::default();
        assert!(publication.id().is_empty());
        assert!(publication.event_type().is_empty());
        assert!(publication.data().is_empty());
        assert!(publication.retry().is_none());
    }
}
