//! Resilient client for `text/event-stream` endpoints.
//!
//! - **Auto-Reconnection**: exponential backoff seeded by the server's
//!   `retry:` interval, resuming with `Last-Event-ID`.
//! - **Redirects**: followed manually so `Cache-Control`, `Accept` and
//!   `Last-Event-ID` survive every hop, up to [`MAX_REDIRECTS`].
//! - **Reconnect Policy**: a [`ReconnectHandler`] sees every error and may stop
//!   the stream for good, e.g. [`StopOnStatus`] on `401`.
//! - **Handle/Events/Errors Split**: a background task per stream, observed
//!   through a clone-able [`StreamHandle`] and two independent sequences.
//!
//! # Architecture
//!
//! ```text
//! Client::subscribe(url, last_event_id)
//!   └─ first attempt, then tokio::spawn(Driver::run)
//!        │                                   │
//!        ├── StreamHandle ── cancel / watch ─┤  (close, state)
//!        │                                   │
//!        ├── Events ◄─── mpsc + ack ◄────────┤  (Publication, one in flight)
//!        │                                   │
//!        └── Errors ◄─── mpsc(n) ◄───────────┘  (SseError)
//! ```

mod config;
mod handler;
mod request;
mod stream;

pub use config::{ClientConfig, MAX_REDIRECTS, MAX_RETRY_DELAY};
pub use handler::{AlwaysReconnect, ReconnectFn, ReconnectHandler, StopOnStatus, reconnect_fn};
pub use request::{LAST_EVENT_ID, PROPAGATE_HEADERS};
pub use stream::{Client, Errors, Events, Stream, StreamHandle, StreamState, subscribe};
