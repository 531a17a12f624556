//! EventBus port - In-process publish/subscribe keyed by topic.
//!
//! The engine binds one listener per (subscription, topic) pair and never
//! cares whether events originate in this process or arrive from a broker.
//! The in-memory bus and the Redis fan-out bus both implement this port.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;

use crate::domain::event::{Event, Topic};
use crate::domain::foundation::EventBusError;

/// Receives events published on a topic.
///
/// Implementations should be:
/// - **Quick** - a slow listener delays later listeners of the same publish
/// - **Isolated** - failures are handled inside, never propagated to the bus
#[async_trait]
pub trait EventListener: Send + Sync {
    /// Handle one published event.
    async fn on_event(&self, event: Arc<Event>);

    /// Listener name for logging.
    fn name(&self) -> &'static str;
}

/// Opaque token returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListenerHandle {
    topic: Topic,
    id: u64,
}

impl ListenerHandle {
    pub fn new(topic: Topic, id: u64) -> Self {
        Self { topic, id }
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Port for topic-based publish/subscribe.
///
/// Implementations must ensure:
/// - Listeners of one topic are notified in registration order
/// - A publish notifies each listener registered before it began at most
///   once, and only if the listener is still registered when its turn comes
/// - `unsubscribe` is idempotent
///
/// # Example
///
/// ```ignore
/// let handle = bus.subscribe(&topic, listener)?;
/// bus.publish(&topic, json!({"id": 1})).await?;
/// bus.unsubscribe(&handle);
/// bus.unsubscribe(&handle); // no-op
/// ```
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish a payload on `topic`.
    ///
    /// Returns the number of local listeners notified. Buses that fan out
    /// through a broker return 0 and deliver asynchronously.
    async fn publish(&self, topic: &Topic, payload: JsonValue) -> Result<usize, EventBusError>;

    /// Register a listener for `topic`.
    fn subscribe(
        &self,
        topic: &Topic,
        listener: Arc<dyn EventListener>,
    ) -> Result<ListenerHandle, EventBusError>;

    /// Remove a listener. Removing an unknown handle is a no-op.
    fn unsubscribe(&self, handle: &ListenerHandle);

    /// Number of listeners currently registered for `topic`.
    fn listener_count(&self, topic: &Topic) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_bus_object_safe(_: &dyn EventBus) {}

    #[allow(dead_code)]
    fn assert_listener_object_safe(_: &dyn EventListener) {}

    #[test]
    fn handle_exposes_topic_and_id() {
        let handle = ListenerHandle::new(Topic::new("t").unwrap(), 7);
        assert_eq!(handle.topic().as_str(), "t");
        assert_eq!(handle.id(), 7);
    }

    #[test]
    fn handles_compare_by_topic_and_id() {
        let a = ListenerHandle::new(Topic::new("t").unwrap(), 1);
        let b = ListenerHandle::new(Topic::new("t").unwrap(), 1);
        let c = ListenerHandle::new(Topic::new("u").unwrap(), 1);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
