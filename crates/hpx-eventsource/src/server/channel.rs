//! Per-channel state: bound repository plus live subscriber queues.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::{event::Event, repository::Repository};

/// Sending half of one live subscription.
pub(crate) struct Subscriber {
    pub(crate) id: u64,
    pub(crate) tx: mpsc::Sender<Bytes>,
    /// Set when the subscriber is dropped for falling behind.
    pub(crate) evicted: Arc<AtomicBool>,
}

#[derive(Default)]
pub(crate) struct ChannelState {
    pub(crate) repository: Option<Arc<dyn Repository>>,
    pub(crate) subscribers: Vec<Subscriber>,
}

/// A named channel.
///
/// Publishing and subscribing both take `state`, which gives every channel a
/// single publish order and makes replay-then-register atomic with respect to
/// publishes.
pub(crate) struct Channel {
    pub(crate) name: String,
    pub(crate) state: Mutex<ChannelState>,
}

impl Channel {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(ChannelState::default()),
        }
    }

    /// Store `event` and hand `frame` to every live subscriber.
    ///
    /// Never waits on a subscriber: a full queue gets that subscriber evicted.
    pub(crate) fn publish(&self, event: &Arc<dyn Event>, frame: &Bytes) {
        let mut state = self.state.lock();

        if let Some(repository) = &state.repository {
            repository.add(&self.name, Arc::clone(event));
        }

        state
            .subscribers
            .retain(|subscriber| match subscriber.tx.try_send(frame.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        channel = %self.name,
                        subscriber = subscriber.id,
                        "Subscriber queue full, disconnecting slow subscriber"
                    );
                    subscriber.evicted.store(true, Ordering::Release);
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(channel = %self.name, subscriber = subscriber.id, "Subscriber gone");
                    false
                }
            });
    }

    pub(crate) fn remove(&self, id: u64) {
        self.state.lock().subscribers.retain(|s| s.id != id);
    }

    /// Drop every subscriber, ending their streams once drained.
    pub(crate) fn disconnect_all(&self) -> usize {
        let mut state = self.state.lock();
        let count = state.subscribers.len();
        state.subscribers.clear();
        count
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.state.lock().subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{codec::Publication, repository::MemoryRepository};

    fn subscriber(id: u64, capacity: usize) -> (Subscriber, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Subscriber {
                id,
                tx,
                evicted: Arc::new(AtomicBool::new(false)),
            },
            rx,
        )
    }

    #[test]
    fn publish_stores_and_fans_out() {
        let channel = Channel::new("articles");
        let repo = Arc::new(MemoryRepository::new());
        let (sub, mut rx) = subscriber(1, 4);
        {
            let mut state = channel.state.lock();
            state.repository = Some(repo.clone());
            state.subscribers.push(sub);
        }

        let event: Arc<dyn Event> = Arc::new(Publication::new("x").with_id("1"));
        channel.publish(&event, &Bytes::from_static(b"id: 1\ndata: x\n\n"));

        assert_eq!(repo.len("articles"), 1);
        assert_eq!(
            rx.try_recv().expect("frame"),
            Bytes::from_static(b"id: 1\ndata: x\n\n")
        );
    }

    #[test]
    fn full_queue_evicts_only_that_subscriber() {
        let channel = Channel::new("c");
        let (slow, _slow_rx) = subscriber(1, 1);
        let slow_flag = Arc::clone(&slow.evicted);
        let (fast, mut fast_rx) = subscriber(2, 8);
        channel.state.lock().subscribers.extend([slow, fast]);

        let event: Arc<dyn Event> = Arc::new(Publication::new("x"));
        for _ in 0..3 {
            channel.publish(&event, &Bytes::from_static(b"data: x\n\n"));
            while fast_rx.try_recv().is_ok() {}
        }

        assert!(slow_flag.load(Ordering::Acquire));
        assert_eq!(channel.subscriber_count(), 1);
        assert_eq!(channel.state.lock().subscribers[0].id, 2);
    }

    #[test]
    fn closed_subscribers_are_pruned() {
        let channel = Channel::new("c");
        let (sub, rx) = subscriber(1, 1);
        channel.state.lock().subscribers.push(sub);
        drop(rx);

        let event: Arc<dyn Event> = Arc::new(Publication::new("x"));
        channel.publish(&event, &Bytes::from_static(b"data: x\n\n"));
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[test]
    fn remove_and_disconnect_all() {
        let channel = Channel::new("c");
        let (a, _ra) = subscriber(1, 1);
        let (b, _rb) = subscriber(2, 1);
        channel.state.lock().subscribers.extend([a, b]);

        channel.remove(1);
        assert_eq!(channel.subscriber_count(), 1);
        assert_eq!(channel.disconnect_all(), 1);
        assert_eq!(channel.subscriber_count(), 0);
    }
}
