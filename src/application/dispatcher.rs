//! DispatchEngine - Turns bus events into per-subscription results.
//!
//! Every active binding gets a [`SubscriptionListener`] on the bus. When an
//! event arrives the listener hands it to the engine, which:
//!
//! 1. skips entries that are not `Active` (pending or already removed)
//! 2. evaluates the binding filter
//! 3. runs the query executor for the subscription
//! 4. sends `data` (or a scoped `error`) through the transport
//!
//! Failures in steps 2-3 are confined to the one subscription. They never
//! reach the publisher or other listeners on the same event.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::domain::event::Event;
use crate::domain::foundation::{DispatchFault, TransportError};
use crate::domain::protocol::ServerMessage;
use crate::domain::subscription::{ChannelBinding, SubscriptionEntry};
use crate::ports::{EventListener, QueryExecutor, Transport};

/// What happened to one event for one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A `data` message was enqueued.
    Delivered,
    /// The filter did not match.
    Filtered,
    /// Filter or executor failed; an `error` message was sent instead.
    Faulted,
    /// The entry was not active when the event arrived.
    Skipped,
    /// A result was produced but the subscription or connection went away.
    Discarded,
}

/// Running totals, mostly for logs and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub delivered: u64,
    pub filtered: u64,
    pub faulted: u64,
    pub discarded: u64,
}

#[derive(Default)]
struct Counters {
    delivered: AtomicU64,
    filtered: AtomicU64,
    faulted: AtomicU64,
    discarded: AtomicU64,
}

/// Filter → execute → deliver, for one entry at a time.
pub struct DispatchEngine {
    executor: Arc<dyn QueryExecutor>,
    transport: Arc<dyn Transport>,
    counters: Counters,
}

impl DispatchEngine {
    pub fn new(executor: Arc<dyn QueryExecutor>, transport: Arc<dyn Transport>) -> Self {
        Self {
            executor,
            transport,
            counters: Counters::default(),
        }
    }

    /// Dispatches one event for one binding of `entry`.
    pub async fn dispatch(
        &self,
        entry: &SubscriptionEntry,
        binding: &ChannelBinding,
        event: &Event,
    ) -> DispatchOutcome {
        if !entry.is_active() {
            return DispatchOutcome::Skipped;
        }

        match binding.matches(event, entry.arguments()) {
            Ok(true) => {}
            Ok(false) => {
                self.counters.filtered.fetch_add(1, Ordering::Relaxed);
                return DispatchOutcome::Filtered;
            }
            Err(source) => {
                let fault = DispatchFault::FilterFailed {
                    topic: binding.topic().to_string(),
                    source,
                };
                return self.fault(entry, fault);
            }
        }

        let result = self.executor.execute(entry.request(), event).await;

        // Unsubscribed or disconnected while the executor ran
        if !entry.is_active() {
            tracing::debug!(
                subscription_id = %entry.id(),
                event_id = %event.id(),
                "Discarding result for removed subscription"
            );
            self.counters.discarded.fetch_add(1, Ordering::Relaxed);
            return DispatchOutcome::Discarded;
        }

        match result {
            Ok(value) => {
                let message = ServerMessage::data(entry.operation_id().as_str(), value);
                if self.deliver(entry, message) {
                    self.counters.delivered.fetch_add(1, Ordering::Relaxed);
                    DispatchOutcome::Delivered
                } else {
                    self.counters.discarded.fetch_add(1, Ordering::Relaxed);
                    DispatchOutcome::Discarded
                }
            }
            Err(source) => self.fault(entry, DispatchFault::ExecutionFailed { source }),
        }
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            filtered: self.counters.filtered.load(Ordering::Relaxed),
            faulted: self.counters.faulted.load(Ordering::Relaxed),
            discarded: self.counters.discarded.load(Ordering::Relaxed),
        }
    }

    /// Reports a fault to the owning subscription only.
    fn fault(&self, entry: &SubscriptionEntry, fault: DispatchFault) -> DispatchOutcome {
        tracing::warn!(
            subscription_id = %entry.id(),
            connection_id = %entry.connection_id(),
            error = %fault,
            "Subscription dispatch failed"
        );
        self.counters.faulted.fetch_add(1, Ordering::Relaxed);

        let message =
            ServerMessage::error(entry.operation_id().as_str(), fault.code(), fault.to_string());
        self.deliver(entry, message);
        DispatchOutcome::Faulted
    }

    fn deliver(&self, entry: &SubscriptionEntry, message: ServerMessage) -> bool {
        match self.transport.send(entry.connection_id(), message) {
            Ok(()) => true,
            Err(TransportError::UnknownConnection(connection_id)) => {
                tracing::debug!(%connection_id, "Connection gone, result dropped");
                false
            }
            Err(e @ TransportError::Overflow(_)) => {
                tracing::warn!(subscription_id = %entry.id(), error = %e, "Result dropped");
                false
            }
        }
    }
}

/// Bus listener for one binding of one subscription.
pub struct SubscriptionListener {
    entry: Arc<SubscriptionEntry>,
    binding: ChannelBinding,
    engine: Arc<DispatchEngine>,
}

impl SubscriptionListener {
    pub fn new(
        entry: Arc<SubscriptionEntry>,
        binding: ChannelBinding,
        engine: Arc<DispatchEngine>,
    ) -> Self {
        Self {
            entry,
            binding,
            engine,
        }
    }
}

#[async_trait]
impl EventListener for SubscriptionListener {
    async fn on_event(&self, event: Arc<Event>) {
        self.engine
            .dispatch(&self.entry, &self.binding, &event)
            .await;
    }

    fn name(&self) -> &'static str {
        "SubscriptionListener"
    }
}
