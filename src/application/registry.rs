//! SubscriptionRegistry - Owns subscription entries and their bus bindings.
//!
//! Two indices are kept in step under one lock:
//!
//! - subscription id → entry + listener handles
//! - connection id → subscription ids (registration order)
//!
//! The bus holds the topic index. Registration binds every topic while the
//! entry is still `Pending` and only then activates it, so a publish can
//! never observe a half-registered subscription. Lock order is registry
//! then bus; the bus never calls back into the registry.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::foundation::{
    ConnectionId, OperationId, RegistryError, ResolutionError, SubscriptionId,
};
use crate::domain::subscription::{SubscriptionEntry, SubscriptionRequest};
use crate::ports::{EventBus, ListenerHandle};

use super::dispatcher::{DispatchEngine, SubscriptionListener};
use super::resolver::ChannelResolver;

struct Registration {
    entry: Arc<SubscriptionEntry>,
    handles: Vec<ListenerHandle>,
}

#[derive(Default)]
struct RegistryState {
    connections: HashMap<ConnectionId, Vec<SubscriptionId>>,
    entries: HashMap<SubscriptionId, Registration>,
}

pub struct SubscriptionRegistry {
    bus: Arc<dyn EventBus>,
    resolver: ChannelResolver,
    dispatcher: Arc<DispatchEngine>,
    state: Mutex<RegistryState>,
}

impl SubscriptionRegistry {
    pub fn new(
        bus: Arc<dyn EventBus>,
        resolver: ChannelResolver,
        dispatcher: Arc<DispatchEngine>,
    ) -> Self {
        Self {
            bus,
            resolver,
            dispatcher,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Starts accepting registrations for `connection_id`.
    pub fn open_connection(&self, connection_id: ConnectionId) {
        self.state
            .lock()
            .connections
            .entry(connection_id)
            .or_default();
    }

    pub fn is_open(&self, connection_id: ConnectionId) -> bool {
        self.state.lock().connections.contains_key(&connection_id)
    }

    /// Resolves, binds and activates a subscription.
    ///
    /// On any failure every binding made so far is removed again and no
    /// entry is left in the registry.
    pub fn register(
        &self,
        operation_id: OperationId,
        request: SubscriptionRequest,
    ) -> Result<Arc<SubscriptionEntry>, RegistryError> {
        let connection_id = request.connection_id();
        let bindings = self.resolver.resolve(&request)?;
        let entry = Arc::new(SubscriptionEntry::new(
            SubscriptionId::next(),
            operation_id,
            request,
            bindings,
        ));

        let mut state = self.state.lock();
        if !state.connections.contains_key(&connection_id) {
            return Err(RegistryError::ConnectionClosed(connection_id));
        }

        let mut handles = Vec::with_capacity(entry.bindings().len());
        for binding in entry.bindings() {
            let listener = SubscriptionListener::new(
                Arc::clone(&entry),
                binding.clone(),
                Arc::clone(&self.dispatcher),
            );
            match self.bus.subscribe(binding.topic(), Arc::new(listener)) {
                Ok(handle) => handles.push(handle),
                Err(source) => {
                    self.unbind(&entry, &handles);
                    return Err(ResolutionError::BindFailed {
                        topic: binding.topic().to_string(),
                        source,
                    }
                    .into());
                }
            }
        }

        if let Err(e) = entry.activate() {
            self.unbind(&entry, &handles);
            return Err(e.into());
        }

        state.entries.insert(
            entry.id(),
            Registration {
                entry: Arc::clone(&entry),
                handles,
            },
        );
        if let Some(subscriptions) = state.connections.get_mut(&connection_id) {
            subscriptions.push(entry.id());
        }

        tracing::debug!(
            subscription_id = %entry.id(),
            %connection_id,
            name = %entry.request().name,
            topics = entry.bindings().len(),
            "Subscription registered"
        );

        Ok(entry)
    }

    /// Removes a subscription. Unknown or already-removed ids are a no-op.
    ///
    /// Returns the removed entry so callers can fire hooks exactly once.
    pub fn unregister(&self, subscription_id: SubscriptionId) -> Option<Arc<SubscriptionEntry>> {
        let mut state = self.state.lock();
        let registration = state.entries.remove(&subscription_id)?;

        let connection_id = registration.entry.connection_id();
        if let Some(subscriptions) = state.connections.get_mut(&connection_id) {
            subscriptions.retain(|id| *id != subscription_id);
        }

        self.unbind(&registration.entry, &registration.handles);
        tracing::debug!(%subscription_id, %connection_id, "Subscription unregistered");

        Some(registration.entry)
    }

    /// Removes every subscription of a connection and stops accepting new
    /// ones for it. Returns the removed entries in registration order.
    pub fn drop_connection(&self, connection_id: ConnectionId) -> Vec<Arc<SubscriptionEntry>> {
        let mut state = self.state.lock();
        let Some(subscription_ids) = state.connections.remove(&connection_id) else {
            return Vec::new();
        };

        let mut removed = Vec::with_capacity(subscription_ids.len());
        for subscription_id in subscription_ids {
            if let Some(registration) = state.entries.remove(&subscription_id) {
                self.unbind(&registration.entry, &registration.handles);
                removed.push(registration.entry);
            }
        }

        tracing::debug!(%connection_id, removed = removed.len(), "Connection dropped");
        removed
    }

    pub fn entry(&self, subscription_id: SubscriptionId) -> Option<Arc<SubscriptionEntry>> {
        self.state
            .lock()
            .entries
            .get(&subscription_id)
            .map(|registration| Arc::clone(&registration.entry))
    }

    pub fn subscription_count(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn connection_count(&self) -> usize {
        self.state.lock().connections.len()
    }

    /// Subscription ids owned by a connection, in registration order.
    pub fn connection_subscriptions(&self, connection_id: ConnectionId) -> Vec<SubscriptionId> {
        self.state
            .lock()
            .connections
            .get(&connection_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn dispatcher(&self) -> &Arc<DispatchEngine> {
        &self.dispatcher
    }

    /// Marks the entry removed first so in-flight dispatches stop, then
    /// releases its bus listeners.
    fn unbind(&self, entry: &SubscriptionEntry, handles: &[ListenerHandle]) {
        entry.remove();
        for handle in handles {
            self.bus.unsubscribe(handle);
        }
    }
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SubscriptionRegistry")
            .field("connections", &state.connections.len())
            .field("subscriptions", &state.entries.len())
            .finish()
    }
}
