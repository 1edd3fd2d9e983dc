//! The event contract shared by the encoder, the repository and the hub.
//!
//! Applications publish their own types by implementing [`Event`]; the
//! decoder hands back the concrete [`Publication`](crate::codec::Publication),
//! which implements the same trait.

use std::{borrow::Cow, sync::Arc, time::Duration};

/// A single server-sent event.
///
/// # Example
///
/// ```rust
/// use std::borrow::Cow;
///
/// use hpx_eventsource::Event;
///
/// struct PriceTick {
///     seq: String,
///     price: u64,
/// }
///
/// impl Event for PriceTick {
///     fn id(&self) -> &str {
///         &self.seq
///     }
///
///     fn event_type(&self) -> &str {
///         "tick"
///     }
///
///     fn data(&self) -> Cow<'_, str> {
///         Cow::Owned(self.price.to_string())
///     }
/// }
/// ```
pub trait Event: Send + Sync {
    /// Identifier used for resumption and replay ordering.
    ///
    /// An empty identifier marks an anonymous event that clients cannot
    /// resume from.
    fn id(&self) -> &str;

    /// Event type name. Empty means the generic `message` type.
    fn event_type(&self) -> &str;

    /// Payload. Embedded newlines are preserved across the wire.
    fn data(&self) -> Cow<'_, str>;

    /// Reconnection interval the server wants clients to use, if any.
    fn retry(&self) -> Option<Duration> {
        None
    }
}

impl<T: Event + ?Sized> Event for Arc<T> {
    fn id(&self) -> &str {
        (**self).id()
    }

    fn event_type(&self) -> &str {
        (**self).event_type()
    }

    fn data(&self) -> Cow<'_, str> {
        (**self).data()
    }

    fn retry(&self) -> Option<Duration> {
        (**self).retry()
    }
}

impl<T: Event + ?Sized> Event for Box<T> {
    fn id(&self) -> &str {
        (**self).id()
    }

    fn event_type(&self) -> &str {
        (**self).event_type()
    }

    fn data(&self) -> Cow<'_, str> {
        (**self).data()
    }

    fn retry(&self) -> Option<Duration> {
        (**self).retry()
    }
}
