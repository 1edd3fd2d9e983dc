//! The broadcast hub.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use bytes::Bytes;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{
    channel::{Channel, Subscriber},
    config::ServerConfig,
    subscription::Subscription,
};
use crate::{
    codec::Encoder,
    error::{SseError, SseResult},
    event::Event,
    repository::Repository,
};

struct Inner {
    config: ServerConfig,
    heartbeat_frame: Bytes,
    channels: RwLock<HashMap<String, Arc<Channel>>>,
    closed: AtomicBool,
    next_subscriber: AtomicU64,
}

impl Inner {
    fn channel(&self, name: &str) -> Option<Arc<Channel>> {
        self.channels.read().get(name).cloned()
    }

    fn channel_or_insert(&self, name: &str) -> Arc<Channel> {
        if let Some(channel) = self.channel(name) {
            return channel;
        }
        let mut channels = self.channels.write();
        Arc::clone(
            channels
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Channel::new(name))),
        )
    }
}

/// Fans published events out to live subscribers, per channel, with replay
/// from a bound [`Repository`] on connect.
///
/// Cheap to clone; clones share the same channels.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use hpx_eventsource::{MemoryRepository, Publication, Server};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let server = Server::new();
/// server.register("articles", Arc::new(MemoryRepository::new()));
///
/// let app = axum::Router::new().route("/articles", server.handler("articles"));
/// let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
/// tokio::spawn(async move { axum::serve(listener, app).await });
///
/// server.publish(["articles"], Arc::new(Publication::new("hello").with_id("1")));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Server {
    inner: Arc<Inner>,
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Server {
    /// Create a hub with the default configuration.
    pub fn new() -> Self {
        Self::build(ServerConfig::default())
    }

    /// Create a hub with a custom configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration validation fails.
    pub fn with_config(config: ServerConfig) -> SseResult<Self> {
        config.validate().map_err(SseError::config)?;
        Ok(Self::build(config))
    }

    fn build(config: ServerConfig) -> Self {
        let heartbeat_frame = Encoder::new().comment(&config.heartbeat_comment);
        Self {
            inner: Arc::new(Inner {
                config,
                heartbeat_frame,
                channels: RwLock::new(HashMap::new()),
                closed: AtomicBool::new(false),
                next_subscriber: AtomicU64::new(0),
            }),
        }
    }

    /// The configuration this hub was built with.
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Bind `channel` to `repository`. A second call for the same channel
    /// replaces the previous binding.
    ///
    /// Ignored once the hub is closed.
    pub fn register(&self, channel: &str, repository: Arc<dyn Repository>) {
        if self.is_closed() {
            warn!(channel, "Register on closed server ignored");
            return;
        }

        let entry = self.inner.channel_or_insert(channel);
        let previous = entry.state.lock().repository.replace(repository);
        if previous.is_some() {
            info!(channel, "Channel repository replaced");
        } else {
            info!(channel, "Channel registered");
        }
    }

    /// Publish `event` on every named channel.
    ///
    /// For each channel the event is appended to the bound repository, if
    /// any, and queued to every live subscriber. Subscribers of a channel see
    /// publications in call order. A subscriber whose queue is full is
    /// disconnected; this call never waits on subscribers.
    pub fn publish<I, S>(&self, channels: I, event: Arc<dyn Event>)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if self.is_closed() {
            debug!(id = event.id(), "Publish on closed server ignored");
            return;
        }

        let frame = Encoder::new().event(&*event);
        for name in channels {
            let name = name.as_ref();
            match self.inner.channel(name) {
                Some(channel) => channel.publish(&event, &frame),
                None => debug!(channel = name, "Publish to unknown channel skipped"),
            }
        }
    }

    /// Open a subscription on `channel`.
    ///
    /// When `last_event_id` is non-empty and a repository is bound, the
    /// events it replays come first. Replay and registration happen under
    /// the channel lock, so concurrent publications are delivered exactly
    /// once: either replayed or live.
    ///
    /// # Errors
    ///
    /// Returns [`SseError::ServerClosed`] once the hub is closed.
    pub fn subscribe(&self, channel: &str, last_event_id: Option<&str>) -> SseResult<Subscription> {
        if self.is_closed() {
            return Err(SseError::ServerClosed);
        }

        let entry = self.inner.channel_or_insert(channel);
        let id = self.inner.next_subscriber.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.inner.config.subscriber_queue_capacity);
        let evicted = Arc::new(AtomicBool::new(false));

        let replay = {
            let mut state = entry.state.lock();
            // Checked again under the lock so close() cannot miss us.
            if self.is_closed() {
                return Err(SseError::ServerClosed);
            }

            let mut replay = VecDeque::new();
            if let (Some(last_id), Some(repository)) =
                (last_event_id.filter(|id| !id.is_empty()), &state.repository)
            {
                let mut encoder = Encoder::new();
                replay.extend(
                    repository
                        .replay(channel, last_id)
                        .iter()
                        .map(|event| encoder.event(&**event)),
                );
            }

            state.subscribers.push(Subscriber {
                id,
                tx,
                evicted: Arc::clone(&evicted),
            });
            replay
        };

        info!(
            channel,
            subscriber = id,
            last_event_id = last_event_id.unwrap_or_default(),
            replayed = replay.len(),
            "Subscriber added"
        );

        let heartbeat = self
            .inner
            .config
            .heartbeat_interval
            .map(|period| (period, self.inner.heartbeat_frame.clone()));

        Ok(Subscription::new(id, entry, replay, rx, evicted, heartbeat))
    }

    /// Number of live subscribers on `channel`.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.inner
            .channel(channel)
            .map_or(0, |channel| channel.subscriber_count())
    }

    /// Returns `true` once [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Disconnect every subscriber and refuse new registrations,
    /// subscriptions and publications. Idempotent.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let channels: Vec<_> = self.inner.channels.read().values().cloned().collect();
        let disconnected: usize = channels.iter().map(|c| c.disconnect_all()).sum();
        info!(disconnected, "Server closed");
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.inner.config)
            .field("channels", &self.inner.channels.read().len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures_util::StreamExt;
    use tokio::time::timeout;

    use super::*;
    use crate::{codec::Publication, repository::MemoryRepository};

    fn quiet() -> Server {
        Server::with_config(ServerConfig::new().heartbeat_interval(None)).expect("valid config")
    }

    fn article(id: &str) -> Arc<dyn Event> {
        Arc::new(Publication::new(format!("article {id}")).with_id(id))
    }

    async fn next(sub: &mut Subscription) -> Bytes {
        timeout(Duration::from_secs(1), sub.next())
            .await
            .expect("timeout")
            .expect("frame")
    }

    #[tokio::test]
    async fn live_subscriber_sees_publish_order() {
        let server = quiet();
        let mut sub = server.subscribe("articles", None).expect("subscribe");

        for id in ["1", "2", "3"] {
            server.publish(["articles"], article(id));
        }

        assert_eq!(next(&mut sub).await, "id: 1\ndata: article 1\n\n");
        assert_eq!(next(&mut sub).await, "id: 2\ndata: article 2\n\n");
        assert_eq!(next(&mut sub).await, "id: 3\ndata: article 3\n\n");
    }

    #[tokio::test]
    async fn replay_precedes_live_events() {
        let server = quiet();
        server.register("articles", Arc::new(MemoryRepository::new()));
        for id in ["2", "1", "3"] {
            server.publish(["articles"], article(id));
        }

        let mut sub = server.subscribe("articles", Some("1")).expect("subscribe");
        server.publish(["articles"], article("4"));

        assert_eq!(next(&mut sub).await, "id: 2\ndata: article 2\n\n");
        assert_eq!(next(&mut sub).await, "id: 3\ndata: article 3\n\n");
        assert_eq!(next(&mut sub).await, "id: 4\ndata: article 4\n\n");
    }

    #[tokio::test]
    async fn no_replay_without_last_event_id() {
        let server = quiet();
        server.register("articles", Arc::new(MemoryRepository::new()));
        server.publish(["articles"], article("1"));

        let mut sub = server.subscribe("articles", Some("")).expect("subscribe");
        server.publish(["articles"], article("2"));
        assert_eq!(next(&mut sub).await, "id: 2\ndata: article 2\n\n");
    }

    #[tokio::test]
    async fn publish_to_multiple_channels() {
        let server = quiet();
        let mut a = server.subscribe("a", None).expect("subscribe");
        let mut b = server.subscribe("b", None).expect("subscribe");

        server.publish(["a", "b", "missing"], article("1"));
        assert_eq!(next(&mut a).await, next(&mut b).await);
    }

    #[tokio::test]
    async fn register_replaces_repository() {
        let server = quiet();
        let first = Arc::new(MemoryRepository::new());
        let second = Arc::new(MemoryRepository::new());
        server.register("c", first.clone());
        server.register("c", second.clone());

        server.publish(["c"], article("1"));
        assert!(first.is_empty("c"));
        assert_eq!(second.len("c"), 1);
    }

    #[tokio::test]
    async fn slow_subscriber_is_dropped_without_blocking() {
        let server = Server::with_config(
            ServerConfig::new()
                .subscriber_queue_capacity(2)
                .heartbeat_interval(None),
        )
        .expect("valid config");
        let mut slow = server.subscribe("c", None).expect("subscribe");
        let mut healthy = server.subscribe("c", None).expect("subscribe");

        for i in 0..5 {
            server.publish(["c"], article(&i.to_string()));
            next(&mut healthy).await;
        }

        assert_eq!(server.subscriber_count("c"), 1);
        let ended = timeout(Duration::from_secs(1), slow.next())
            .await
            .expect("timeout");
        assert!(ended.is_none());
    }

    #[tokio::test]
    async fn dropping_subscription_unregisters() {
        let server = quiet();
        let sub = server.subscribe("c", None).expect("subscribe");
        assert_eq!(server.subscriber_count("c"), 1);
        drop(sub);
        assert_eq!(server.subscriber_count("c"), 0);
    }

    #[tokio::test]
    async fn close_ends_subscriptions_and_is_idempotent() {
        let server = quiet();
        let mut sub = server.subscribe("c", None).expect("subscribe");

        server.close();
        server.close();

        let ended = timeout(Duration::from_secs(1), sub.next())
            .await
            .expect("timeout");
        assert!(ended.is_none());
        assert!(matches!(
            server.subscribe("c", None),
            Err(SseError::ServerClosed)
        ));

        let repo = Arc::new(MemoryRepository::new());
        server.register("c", repo.clone());
        server.publish(["c"], article("1"));
        assert!(repo.is_empty("c"));
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_on_idle_connection() {
        let server = Server::with_config(
            ServerConfig::new()
                .heartbeat_interval(Some(Duration::from_secs(5)))
                .heartbeat_comment("ping"),
        )
        .expect("valid config");
        let mut sub = server.subscribe("c", None).expect("subscribe");

        let frame = timeout(Duration::from_secs(6), sub.next())
            .await
            .expect("timeout")
            .expect("frame");
        assert_eq!(frame, ":ping\n");
    }
}
