//! Redis-backed event bus for multi-process fan-out.
//!
//! Every process publishes to Redis and receives everything back through a
//! single pattern subscription. Received events are dispatched to a local
//! [`InMemoryEventBus`], which owns the listener tables, so ordering and
//! unsubscribe semantics are identical to the single-process bus.
//!
//! ```text
//! publish ──PUBLISH <prefix><topic>──▶ Redis ──PSUBSCRIBE <prefix>*──▶ forwarder
//!                                                                        │
//!                                                       InMemoryEventBus::dispatch
//! ```

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::{MultiplexedConnection, PubSub};
use redis::AsyncCommands;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::domain::event::{Event, Topic};
use crate::domain::foundation::{EngineFault, EventBusError};
use crate::ports::{EventBus, EventListener, FaultReporter, ListenerHandle};

use super::InMemoryEventBus;

const FAULT_SOURCE: &str = "redis_event_bus";

/// Event bus that fans out through Redis pub/sub.
///
/// Local listener registration never touches Redis; only `publish` does.
/// `publish` returns 0 because delivery happens on the forwarder task.
pub struct RedisEventBus {
    conn: MultiplexedConnection,
    channel_prefix: String,
    local: Arc<InMemoryEventBus>,
    forwarder: JoinHandle<()>,
}

impl RedisEventBus {
    /// Connect, subscribe to `<channel_prefix>*` and start forwarding.
    ///
    /// Forwarding faults (undecodable messages, the stream ending) are
    /// reported through `faults`.
    pub async fn connect(
        url: &str,
        channel_prefix: impl Into<String>,
        faults: FaultReporter,
    ) -> Result<Self, EventBusError> {
        let channel_prefix = channel_prefix.into();
        let client = redis::Client::open(url).map_err(unavailable)?;
        let conn = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(unavailable)?;

        let mut pubsub = client.get_async_pubsub().await.map_err(unavailable)?;
        pubsub
            .psubscribe(format!("{}*", channel_prefix))
            .await
            .map_err(unavailable)?;

        let local = Arc::new(InMemoryEventBus::new());
        let forwarder = tokio::spawn(forward(
            pubsub,
            channel_prefix.clone(),
            Arc::clone(&local),
            faults,
        ));

        tracing::info!(prefix = %channel_prefix, "Redis event bus connected");

        Ok(Self {
            conn,
            channel_prefix,
            local,
            forwarder,
        })
    }

    fn channel_for(&self, topic: &Topic) -> String {
        channel_name(&self.channel_prefix, topic)
    }
}

impl Drop for RedisEventBus {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}

impl std::fmt::Debug for RedisEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisEventBus")
            .field("channel_prefix", &self.channel_prefix)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EventBus for RedisEventBus {
    async fn publish(&self, topic: &Topic, payload: JsonValue) -> Result<usize, EventBusError> {
        let event = Event::new(topic.clone(), payload);
        let body = encode_event(&event)?;

        let mut conn = self.conn.clone();
        conn.publish::<_, _, i64>(self.channel_for(topic), body)
            .await
            .map_err(unavailable)?;

        Ok(0)
    }

    fn subscribe(
        &self,
        topic: &Topic,
        listener: Arc<dyn EventListener>,
    ) -> Result<ListenerHandle, EventBusError> {
        self.local.subscribe(topic, listener)
    }

    fn unsubscribe(&self, handle: &ListenerHandle) {
        self.local.unsubscribe(handle)
    }

    fn listener_count(&self, topic: &Topic) -> usize {
        self.local.listener_count(topic)
    }
}

async fn forward(
    pubsub: PubSub,
    prefix: String,
    local: Arc<InMemoryEventBus>,
    faults: FaultReporter,
) {
    let mut messages = pubsub.into_on_message();

    while let Some(msg) = messages.next().await {
        let decoded = msg
            .get_payload::<String>()
            .map_err(|e| EventBusError::Serialization(e.to_string()))
            .and_then(|body| decode_event(&prefix, msg.get_channel_name(), &body));

        match decoded {
            Ok(event) => {
                local.dispatch(Arc::new(event)).await;
            }
            Err(e) => faults.report(EngineFault::new(FAULT_SOURCE, e.to_string())),
        }
    }

    faults.report(EngineFault::new(FAULT_SOURCE, "Redis pub/sub stream ended"));
}

/// Redis channel carrying `topic`.
fn channel_name(prefix: &str, topic: &Topic) -> String {
    format!("{}{}", prefix, topic)
}

fn encode_event(event: &Event) -> Result<String, EventBusError> {
    serde_json::to_string(event).map_err(|e| EventBusError::Serialization(e.to_string()))
}

/// Decode a message body and check it arrived on its topic's channel.
fn decode_event(prefix: &str, channel: &str, body: &str) -> Result<Event, EventBusError> {
    let event: Event =
        serde_json::from_str(body).map_err(|e| EventBusError::Serialization(e.to_string()))?;

    if channel_name(prefix, event.topic()) != channel {
        return Err(EventBusError::Serialization(format!(
            "event for topic '{}' arrived on channel '{}'",
            event.topic(),
            channel
        )));
    }

    Ok(event)
}

fn unavailable(e: redis::RedisError) -> EventBusError {
    EventBusError::Unavailable(e.to_string())
}
