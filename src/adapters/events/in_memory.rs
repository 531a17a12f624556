//! In-memory event bus.
//!
//! Process-local listener tables keyed by topic. Used directly for
//! single-process deployments and as the local fan-out stage of the Redis
//! bus.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::domain::event::{Event, Topic};
use crate::domain::foundation::EventBusError;
use crate::ports::{EventBus, EventListener, ListenerHandle};

#[derive(Clone)]
struct ListenerSlot {
    id: u64,
    listener: Arc<dyn EventListener>,
    /// Cleared on unsubscribe so in-flight snapshots skip the slot.
    live: Arc<AtomicBool>,
}

/// In-memory event bus.
///
/// Features:
/// - FIFO delivery per topic (registration order)
/// - Listener lists are snapshotted before dispatch, so the lock is never
///   held across an await and listeners added mid-publish are not notified
/// - Listeners removed mid-publish are skipped when their turn comes
///
/// # Example
///
/// ```ignore
/// let bus = Arc::new(InMemoryEventBus::new());
/// let handle = bus.subscribe(&topic, listener)?;
/// let notified = bus.publish(&topic, json!({"id": 1})).await?;
/// ```
pub struct InMemoryEventBus {
    topics: RwLock<HashMap<Topic, Vec<ListenerSlot>>>,
    next_id: AtomicU64,
    events_published: AtomicU64,
}

impl InMemoryEventBus {
    /// Creates a new empty event bus.
    pub fn new() -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            events_published: AtomicU64::new(0),
        }
    }

    /// Deliver an already-stamped event to local listeners.
    ///
    /// Returns the number of listeners notified.
    pub async fn dispatch(&self, event: Arc<Event>) -> usize {
        self.events_published.fetch_add(1, Ordering::Relaxed);

        // Clone the slots to release the lock before await points
        let snapshot: Vec<ListenerSlot> = self
            .topics
            .read()
            .get(event.topic())
            .cloned()
            .unwrap_or_default();

        let mut notified = 0;
        for slot in snapshot {
            if !slot.live.load(Ordering::Acquire) {
                continue;
            }
            slot.listener.on_event(Arc::clone(&event)).await;
            notified += 1;
        }

        tracing::trace!(
            topic = %event.topic(),
            event_id = %event.id(),
            notified,
            "Event dispatched"
        );

        notified
    }

    /// Number of topics with at least one listener.
    pub fn topic_count(&self) -> usize {
        self.topics.read().len()
    }

    /// Total events dispatched since creation.
    pub fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, topic: &Topic, payload: JsonValue) -> Result<usize, EventBusError> {
        let event = Arc::new(Event::new(topic.clone(), payload));
        Ok(self.dispatch(event).await)
    }

    fn subscribe(
        &self,
        topic: &Topic,
        listener: Arc<dyn EventListener>,
    ) -> Result<ListenerHandle, EventBusError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let slot = ListenerSlot {
            id,
            listener,
            live: Arc::new(AtomicBool::new(true)),
        };

        self.topics
            .write()
            .entry(topic.clone())
            .or_default()
            .push(slot);

        Ok(ListenerHandle::new(topic.clone(), id))
    }

    fn unsubscribe(&self, handle: &ListenerHandle) {
        let mut topics = self.topics.write();
        let Some(slots) = topics.get_mut(handle.topic()) else {
            return;
        };

        if let Some(pos) = slots.iter().position(|slot| slot.id == handle.id()) {
            let slot = slots.remove(pos);
            slot.live.store(false, Ordering::Release);
        }

        if slots.is_empty() {
            topics.remove(handle.topic());
        }
    }

    fn listener_count(&self, topic: &Topic) -> usize {
        self.topics.read().get(topic).map(Vec::len).unwrap_or(0)
    }
}
