//! # hpx-eventsource
//!
//! Server-Sent Events end to end: a resilient client for `text/event-stream`
//! endpoints and a broadcast hub that fans published events out to HTTP
//! subscribers, with replay of missed events by `Last-Event-ID`.
//!
//! ## Features
//!
//! - **Wire Codec**: incremental [`Decoder`] over any byte-chunk stream and an
//!   [`Encoder`] for the text framing
//! - **Resilient Client**: exponential backoff, server-advised `retry:`,
//!   `Last-Event-ID` resumption and header-preserving redirects
//! - **Broadcast Hub**: per-channel ordered fan-out with bounded subscriber
//!   queues, heartbeats and an [axum](https://docs.rs/axum) handler
//! - **Pluggable History**: any [`Repository`] drives replay;
//!   [`MemoryRepository`] is included
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use hpx_eventsource::{MemoryRepository, Publication, Server, client};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::new();
//!     server.register("articles", Arc::new(MemoryRepository::new()));
//!
//!     let app = axum::Router::new().route("/articles", server.handler("articles"));
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//!     tokio::spawn(async move { axum::serve(listener, app).await });
//!
//!     let mut stream = client::subscribe("http://127.0.0.1:8080/articles", "").await?;
//!     stream.handle().wait_for(client::StreamState::Open).await;
//!
//!     server.publish(["articles"], Arc::new(Publication::new("hello").with_id("1")));
//!     if let Some(event) = stream.next_event().await {
//!         println!("{}: {}", event.id, event.data);
//!     }
//!
//!     stream.close();
//!     server.close();
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod codec;
pub mod error;
pub mod event;
pub mod repository;
pub mod server;

mod reconnect;

// Re-export commonly used types
pub use client::{Client, ClientConfig, ReconnectHandler, StreamState, subscribe};
pub use codec::{DecodeError, Decoder, Encoder, Publication};
pub use error::{SseError, SseResult};
pub use event::Event;
pub use repository::{MemoryRepository, Repository};
pub use server::{Server, ServerConfig, Subscription};
