//! Body stream of one connected subscriber.

use std::{
    collections::VecDeque,
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    task::{Context, Poll},
    time::Duration,
};

use bytes::Bytes;
use futures_core::Stream;
use tokio::{
    sync::mpsc,
    time::{Instant, Interval, MissedTickBehavior, interval_at},
};
use tracing::debug;

use super::channel::Channel;

/// Encoded frames for one subscriber: replayed history first, then live
/// publications, with heartbeat comments whenever the connection is idle.
///
/// The stream ends when the hub is closed or the subscriber is evicted for
/// falling behind. Dropping it unregisters the subscriber.
///
/// Must be created inside a Tokio runtime when heartbeats are enabled.
pub struct Subscription {
    id: u64,
    channel: Arc<Channel>,
    replay: VecDeque<Bytes>,
    rx: mpsc::Receiver<Bytes>,
    evicted: Arc<AtomicBool>,
    heartbeat: Option<(Interval, Bytes)>,
}

impl Subscription {
    pub(crate) fn new(
        id: u64,
        channel: Arc<Channel>,
        replay: VecDeque<Bytes>,
        rx: mpsc::Receiver<Bytes>,
        evicted: Arc<AtomicBool>,
        heartbeat: Option<(Duration, Bytes)>,
    ) -> Self {
        let heartbeat = heartbeat.map(|(period, frame)| {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            (interval, frame)
        });

        Self {
            id,
            channel,
            replay,
            rx,
            evicted,
            heartbeat,
        }
    }

    /// Identifier of this subscriber, unique per hub.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Name of the subscribed channel.
    pub fn channel(&self) -> &str {
        &self.channel.name
    }

    /// Receive the next frame.
    pub async fn next_frame(&mut self) -> Option<Bytes> {
        std::future::poll_fn(|cx| Pin::new(&mut *self).poll_next(cx)).await
    }
}

impl Stream for Subscription {
    type Item = Bytes;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Bytes>> {
        let this = self.get_mut();

        if this.evicted.load(Ordering::Acquire) {
            return Poll::Ready(None);
        }

        if let Some(frame) = this.replay.pop_front() {
            return Poll::Ready(Some(frame));
        }

        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(frame)) => {
                if let Some((interval, _)) = &mut this.heartbeat {
                    interval.reset();
                }
                return Poll::Ready(Some(frame));
            }
            Poll::Ready(None) => return Poll::Ready(None),
            Poll::Pending => {}
        }

        if let Some((interval, frame)) = &mut this.heartbeat
            && interval.poll_tick(cx).is_ready()
        {
            return Poll::Ready(Some(frame.clone()));
        }

        Poll::Pending
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.channel.remove(self.id);
        debug!(channel = %self.channel.name, subscriber = self.id, "Subscriber removed");
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("channel", &self.channel.name)
            .field("pending_replay", &self.replay.len())
            .finish_non_exhaustive()
    }
}
