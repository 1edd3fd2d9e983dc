//! Per-channel event history with ordered replay.

use std::{
    collections::{BTreeMap, HashMap},
    ops::Bound,
    sync::Arc,
};

use parking_lot::RwLock;

use crate::event::Event;

/// Storage backing replay for one or more channels.
///
/// The hub calls both methods while holding the channel's publish lock, so
/// implementations should return promptly and must be safe to share between
/// threads.
pub trait Repository: Send + Sync + 'static {
    /// Append an event to the history of `channel`.
    fn add(&self, channel: &str, event: Arc<dyn Event>);

    /// Events of `channel` newer than `last_event_id`, in ascending
    /// identifier order.
    ///
    /// An empty or unknown `last_event_id` yields the whole history.
    fn replay(&self, channel: &str, last_event_id: &str) -> Vec<Arc<dyn Event>>;
}

/// Identifier first, insertion sequence second, so duplicate and anonymous
/// identifiers keep their own entries in arrival order.
type HistoryKey = (String, u64);

#[derive(Default)]
struct History {
    events: BTreeMap<HistoryKey, Arc<dyn Event>>,
    next_seq: u64,
}

/// In-memory [`Repository`] ordering identifiers lexicographically.
///
/// Nothing is ever evicted.
#[derive(Default)]
pub struct MemoryRepository {
    channels: RwLock<HashMap<String, History>>,
}

impl MemoryRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events stored for `channel`.
    pub fn len(&self, channel: &str) -> usize {
        self.channels
            .read()
            .get(channel)
            .map_or(0, |history| history.events.len())
    }

    /// Returns `true` if nothing was stored for `channel`.
    pub fn is_empty(&self, channel: &str) -> bool {
        self.len(channel) == 0
    }
}

impl std::fmt::Debug for MemoryRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let channels = self.channels.read();
        f.debug_map()
            .entries(channels.iter().map(|(name, h)| (name, h.events.len())))
            .finish()
    }
}

impl Repository for MemoryRepository {
    fn add(&self, channel: &str, event: Arc<dyn Event>) {
        let mut channels = self.channels.write();
        let history = channels.entry(channel.to_string()).or_default();
        let key = (event.id().to_string(), history.next_seq);
        history.next_seq += 1;
        history.events.insert(key, event);
    }

    fn replay(&self, channel: &str, last_event_id: &str) -> Vec<Arc<dyn Event>> {
        let channels = self.channels.read();
        let Some(history) = channels.get(channel) else {
            return Vec::new();
        };

        let known = !last_event_id.is_empty()
            && history
                .events
                .range((last_event_id.to_string(), 0)..=(last_event_id.to_string(), u64::MAX))
                .next()
                .is_some();

        if !known {
            return history.events.values().cloned().collect();
        }

        history
            .events
            .range((
                Bound::Excluded((last_event_id.to_string(), u64::MAX)),
                Bound::Unbounded,
            ))
            .map(|(_, event)| Arc::clone(event))
            .collect()
    }
}
