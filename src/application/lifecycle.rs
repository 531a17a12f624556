//! ConnectionLifecycleManager - Drives the client protocol for each connection.
//!
//! Phase changes are published on a per-connection `watch` channel. A
//! `start` that arrives while `on_connect` is still running waits on that
//! channel, so no subscription is ever registered before the connection's
//! auth context exists.
//!
//! ```text
//! AwaitingInit ──init──▶ Authenticating ──ok──▶ Ready ──▶ Closed
//!      │                       │
//!      └──timeout──▶ Closed    └──reject──▶ Rejected ──▶ Closed
//! ```

use parking_lot::{Mutex, RwLock};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

use crate::domain::connection::{Connection, ConnectionPhase};
use crate::domain::foundation::{
    AuthContext, ConnectionId, ErrorCode, OperationId, ProtocolError, RegistryError,
    SubscriptionId, Timestamp,
};
use crate::domain::protocol::{ClientMessage, OperationPayload, ServerMessage};
use crate::domain::subscription::{ExecutionContext, SubscriptionRequest};
use crate::ports::{CloseReason, LifecycleHooks, QueryExecutor, Transport};

use super::registry::SubscriptionRegistry;

struct ConnectionSlot {
    connection: Mutex<Connection>,
    phase: watch::Sender<ConnectionPhase>,
}

impl ConnectionSlot {
    fn new(id: ConnectionId) -> Self {
        let (phase, _) = watch::channel(ConnectionPhase::AwaitingInit);
        Self {
            connection: Mutex::new(Connection::new(id)),
            phase,
        }
    }

    fn publish_phase(&self, phase: ConnectionPhase) {
        self.phase.send_replace(phase);
    }

    /// Waits until authentication has settled. Returns the auth context
    /// when the connection is ready, otherwise the phase it settled in.
    async fn ready(&self) -> Result<AuthContext, ConnectionPhase> {
        let mut rx = self.phase.subscribe();
        let phase = match rx
            .wait_for(|phase| *phase != ConnectionPhase::Authenticating)
            .await
        {
            Ok(phase) => *phase,
            Err(_) => ConnectionPhase::Closed,
        };

        if phase != ConnectionPhase::Ready {
            return Err(phase);
        }

        let connection = self.connection.lock();
        match (connection.phase(), connection.auth()) {
            (ConnectionPhase::Ready, Some(auth)) => Ok(auth.clone()),
            (phase, _) => Err(phase),
        }
    }
}

/// Protocol state machine for all connections of one server.
pub struct ConnectionLifecycleManager {
    registry: Arc<SubscriptionRegistry>,
    executor: Arc<dyn QueryExecutor>,
    transport: Arc<dyn Transport>,
    hooks: Arc<dyn LifecycleHooks>,
    connections: RwLock<HashMap<ConnectionId, Arc<ConnectionSlot>>>,
}

impl ConnectionLifecycleManager {
    pub fn new(
        registry: Arc<SubscriptionRegistry>,
        executor: Arc<dyn QueryExecutor>,
        transport: Arc<dyn Transport>,
        hooks: Arc<dyn LifecycleHooks>,
    ) -> Self {
        Self {
            registry,
            executor,
            transport,
            hooks,
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Opens a connection with a fresh id.
    pub fn open(&self) -> ConnectionId {
        let id = ConnectionId::new();
        self.open_with_id(id);
        id
    }

    /// Opens a connection under a transport-chosen id.
    pub fn open_with_id(&self, connection_id: ConnectionId) {
        self.registry.open_connection(connection_id);
        self.connections
            .write()
            .insert(connection_id, Arc::new(ConnectionSlot::new(connection_id)));
        tracing::debug!(%connection_id, "Connection opened");
    }

    /// Decodes and handles one text frame.
    pub async fn handle_raw(&self, connection_id: ConnectionId, text: &str) {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => self.handle_message(connection_id, message).await,
            Err(e) => {
                let error = ProtocolError::Malformed(e.to_string());
                tracing::debug!(%connection_id, error = %error, "Malformed client message");
                self.send(
                    connection_id,
                    ServerMessage::error(operation_id_hint(text), error.code(), error.to_string()),
                );
            }
        }
    }

    pub async fn handle_message(&self, connection_id: ConnectionId, message: ClientMessage) {
        let Some(slot) = self.slot(connection_id) else {
            tracing::debug!(%connection_id, "Message for unknown connection ignored");
            return;
        };

        match message {
            ClientMessage::ConnectionInit { payload } => {
                self.on_init(connection_id, &slot, payload).await
            }
            ClientMessage::Start { id, payload } => {
                self.on_start(connection_id, &slot, id, payload).await
            }
            ClientMessage::Stop { id } => self.on_stop(connection_id, &slot, id),
            ClientMessage::ConnectionTerminate => {
                self.transport.close(connection_id, CloseReason::Terminated);
                self.close(connection_id);
            }
        }
    }

    /// Tears a connection down: every subscription is unregistered, then
    /// `on_disconnect` fires. Safe to call more than once.
    pub fn close(&self, connection_id: ConnectionId) {
        self.close_connection(connection_id, true);
    }

    /// Closes the connection if `connection_init` never arrived.
    pub fn expire_if_uninitialised(&self, connection_id: ConnectionId) -> bool {
        let Some(slot) = self.slot(connection_id) else {
            return false;
        };
        if slot.connection.lock().phase() != ConnectionPhase::AwaitingInit {
            return false;
        }

        tracing::info!(%connection_id, "Connection init timed out");
        self.transport.close(connection_id, CloseReason::InitTimeout);
        self.close(connection_id);
        true
    }

    pub fn phase(&self, connection_id: ConnectionId) -> Option<ConnectionPhase> {
        self.slot(connection_id)
            .map(|slot| slot.connection.lock().phase())
    }

    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }

    async fn on_init(&self, connection_id: ConnectionId, slot: &ConnectionSlot, params: JsonValue) {
        let begun = slot.connection.lock().begin_authentication();
        if let Err(error) = begun {
            tracing::debug!(%connection_id, "Duplicate connection_init");
            self.send(
                connection_id,
                ServerMessage::error("", error.code(), error.to_string()),
            );
            return;
        }
        slot.publish_phase(ConnectionPhase::Authenticating);

        let outcome = self.hooks.on_connect(connection_id, &params).await;

        let settled = {
            let mut connection = slot.connection.lock();
            if connection.phase() == ConnectionPhase::Closed {
                None
            } else {
                Some(match &outcome {
                    Ok(auth) => connection.accept(auth.clone()).map(|_| ConnectionPhase::Ready),
                    Err(_) => connection.reject().map(|_| ConnectionPhase::Rejected),
                })
            }
        };

        match (settled, outcome) {
            (None, _) => {
                tracing::debug!(%connection_id, "Connection closed during on_connect");
            }
            (Some(Err(e)), _) => {
                tracing::error!(%connection_id, error = %e, "Connection phase out of step");
            }
            (Some(Ok(_)), Ok(auth)) => {
                slot.publish_phase(ConnectionPhase::Ready);
                tracing::info!(
                    %connection_id,
                    authenticated = auth.is_authenticated(),
                    "Connection accepted"
                );
                self.send(connection_id, ServerMessage::ConnectionAck);
            }
            (Some(Ok(_)), Err(rejected)) => {
                slot.publish_phase(ConnectionPhase::Rejected);
                tracing::info!(%connection_id, reason = %rejected.reason, "Connection rejected");
                self.send(
                    connection_id,
                    ServerMessage::connection_error(rejected.code(), rejected.reason.clone()),
                );
                self.transport
                    .close(connection_id, CloseReason::AuthRejected(rejected.reason));
                self.close_connection(connection_id, false);
            }
        }
    }

    async fn on_start(
        &self,
        connection_id: ConnectionId,
        slot: &ConnectionSlot,
        operation_id: String,
        payload: OperationPayload,
    ) {
        let operation_id = match OperationId::new(operation_id) {
            Ok(id) => id,
            Err(e) => {
                self.send(
                    connection_id,
                    ServerMessage::error("", ErrorCode::ProtocolError, e.to_string()),
                );
                return;
            }
        };

        let auth = match slot.ready().await {
            Ok(auth) => auth,
            Err(ConnectionPhase::AwaitingInit) => {
                let error = ProtocolError::NotInitialised(operation_id.clone());
                self.send(
                    connection_id,
                    ServerMessage::error(operation_id.as_str(), error.code(), error.to_string()),
                );
                return;
            }
            Err(phase) => {
                tracing::debug!(%connection_id, ?phase, "Start dropped, connection not ready");
                return;
            }
        };

        let name = match self.executor.resolve_operation(&payload) {
            Ok(name) => name,
            Err(e) => {
                self.send(
                    connection_id,
                    ServerMessage::error(operation_id.as_str(), e.code, e.message),
                );
                return;
            }
        };

        let arguments = payload.variables.clone().unwrap_or_default();
        let request = SubscriptionRequest::new(
            name,
            arguments,
            ExecutionContext::new(connection_id, auth),
        )
        .with_operation(payload);

        let mut context = match self.hooks.on_subscribe(&request).await {
            Ok(context) => context,
            Err(rejected) => {
                tracing::debug!(%connection_id, reason = %rejected.reason, "Subscription vetoed");
                self.send(
                    connection_id,
                    ServerMessage::error(operation_id.as_str(), rejected.code(), rejected.to_string()),
                );
                return;
            }
        };
        // Hooks may enrich the context but not move it to another connection
        context.connection_id = connection_id;
        let request = SubscriptionRequest { context, ..request };

        // Reusing a live operation id replaces that subscription
        let previous = slot.connection.lock().untrack(&operation_id);
        if let Some(previous) = previous {
            self.unsubscribe(connection_id, previous);
        }

        let entry = match self.registry.register(operation_id.clone(), request) {
            Ok(entry) => entry,
            Err(RegistryError::ConnectionClosed(_)) => {
                tracing::debug!(%connection_id, "Start dropped, connection closed");
                return;
            }
            Err(e) => {
                tracing::debug!(%connection_id, error = %e, "Subscription registration failed");
                self.send(
                    connection_id,
                    ServerMessage::error(operation_id.as_str(), e.code(), e.to_string()),
                );
                return;
            }
        };

        let replaced = {
            let mut connection = slot.connection.lock();
            if connection.phase() == ConnectionPhase::Closed {
                None
            } else {
                connection.track(operation_id.clone(), entry.id())
            }
        };
        if let Some(replaced) = replaced {
            self.unsubscribe(connection_id, replaced);
        }

        tracing::debug!(
            %connection_id,
            operation_id = %operation_id,
            subscription_id = %entry.id(),
            "Subscription started"
        );
    }

    fn on_stop(&self, connection_id: ConnectionId, slot: &ConnectionSlot, operation_id: String) {
        let Ok(operation_id) = OperationId::new(operation_id) else {
            return;
        };

        let tracked = slot.connection.lock().untrack(&operation_id);
        if let Some(subscription_id) = tracked {
            self.unsubscribe(connection_id, subscription_id);
            self.send(
                connection_id,
                ServerMessage::Complete {
                    id: operation_id.as_str().to_string(),
                },
            );
        }
    }

    fn unsubscribe(&self, connection_id: ConnectionId, subscription_id: SubscriptionId) {
        if self.registry.unregister(subscription_id).is_some() {
            self.hooks.on_unsubscribe(connection_id, subscription_id);
        }
    }

    fn close_connection(&self, connection_id: ConnectionId, notify_hooks: bool) {
        let Some(slot) = self.connections.write().remove(&connection_id) else {
            return;
        };

        let (operations, opened_at) = {
            let mut connection = slot.connection.lock();
            let operations = connection.operation_count();
            if !connection.close() {
                return;
            }
            (operations, connection.opened_at())
        };
        slot.publish_phase(ConnectionPhase::Closed);

        let removed = self.registry.drop_connection(connection_id);
        if notify_hooks {
            for entry in &removed {
                self.hooks.on_unsubscribe(connection_id, entry.id());
            }
            self.hooks.on_disconnect(connection_id);
        }

        tracing::debug!(
            %connection_id,
            operations,
            subscriptions = removed.len(),
            open_secs = Timestamp::now().duration_since(&opened_at).num_seconds(),
            "Connection closed"
        );
    }

    fn slot(&self, connection_id: ConnectionId) -> Option<Arc<ConnectionSlot>> {
        self.connections.read().get(&connection_id).cloned()
    }

    fn send(&self, connection_id: ConnectionId, message: ServerMessage) {
        if let Err(e) = self.transport.send(connection_id, message) {
            tracing::debug!(%connection_id, error = %e, "Outbound message dropped");
        }
    }
}

/// Best-effort operation id from a frame that failed to decode.
fn operation_id_hint(text: &str) -> String {
    serde_json::from_str::<JsonValue>(text)
        .ok()
        .and_then(|value| value.get("id").and_then(JsonValue::as_str).map(str::to_string))
        .unwrap_or_default()
}
