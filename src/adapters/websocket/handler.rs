//! WebSocket upgrade handler for subscription clients.
//!
//! Handles the HTTP → WebSocket upgrade and runs one connection:
//! 1. Negotiate the `graphql-ws` subprotocol
//! 2. Open the connection in the lifecycle manager and attach its queue
//! 3. Writer task: drain the queue, emit `ka` ticks, send the close frame
//! 4. Reader task: feed text frames to the lifecycle manager
//! 5. Close the connection once either side finishes

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{self, Instant, Interval};

use crate::application::SubscriptionServer;
use crate::domain::protocol::ServerMessage;
use crate::ports::CloseReason;

use super::sinks::{ConnectionSinks, Outbound};

/// Subprotocol spoken by subscriptions-transport-ws clients.
pub const GRAPHQL_WS_PROTOCOL: &str = "graphql-ws";

/// Connection timing knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebSocketSettings {
    /// Interval between `ka` messages; `None` disables keep-alive.
    pub keep_alive: Option<Duration>,
    /// How long a client may take to send `connection_init`.
    pub init_timeout: Duration,
}

impl Default for WebSocketSettings {
    fn default() -> Self {
        Self {
            keep_alive: Some(Duration::from_secs(30)),
            init_timeout: Duration::from_secs(10),
        }
    }
}

/// State required for WebSocket handling.
#[derive(Clone)]
pub struct WebSocketState {
    pub server: Arc<SubscriptionServer>,
    pub sinks: Arc<ConnectionSinks>,
    pub settings: WebSocketSettings,
}

impl WebSocketState {
    /// `sinks` must be the transport the server was built with.
    pub fn new(
        server: Arc<SubscriptionServer>,
        sinks: Arc<ConnectionSinks>,
        settings: WebSocketSettings,
    ) -> Self {
        Self {
            server,
            sinks,
            settings,
        }
    }
}

/// Handle WebSocket upgrade requests.
///
/// Route: `GET /subscriptions` (path is configurable)
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<WebSocketState>) -> Response {
    ws.protocols([GRAPHQL_WS_PROTOCOL])
        .on_upgrade(move |socket| handle_socket(socket, state))
}

/// Runs an established WebSocket connection until either side ends it.
async fn handle_socket(socket: WebSocket, state: WebSocketState) {
    let (sender, mut receiver) = socket.split();
    let lifecycle = Arc::clone(state.server.lifecycle());

    let connection_id = lifecycle.open();
    let outbound = state.sinks.attach(connection_id);
    tracing::debug!(%connection_id, "WebSocket connected");

    let mut send_task = tokio::spawn(write_loop(sender, outbound, state.settings.keep_alive));

    let init_timeout = {
        let lifecycle = Arc::clone(&lifecycle);
        let timeout = state.settings.init_timeout;
        tokio::spawn(async move {
            time::sleep(timeout).await;
            lifecycle.expire_if_uninitialised(connection_id);
        })
    };

    let mut recv_task = {
        let lifecycle = Arc::clone(&lifecycle);
        tokio::spawn(async move {
            while let Some(result) = receiver.next().await {
                match result {
                    Ok(Message::Text(text)) => lifecycle.handle_raw(connection_id, &text).await,
                    Ok(Message::Binary(_)) => {
                        tracing::warn!(%connection_id, "Received unsupported binary message");
                    }
                    // Ping/pong are answered by axum
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                    Ok(Message::Close(_)) => {
                        tracing::debug!(%connection_id, "Client sent close frame");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%connection_id, "Receive error: {}", e);
                        break;
                    }
                }
            }
        })
    };

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
    init_timeout.abort();

    state.sinks.detach(connection_id);
    lifecycle.close(connection_id);
    tracing::debug!(%connection_id, "WebSocket disconnected");
}

/// Drains the outbound queue and emits keep-alive ticks.
async fn write_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<Outbound>,
    keep_alive: Option<Duration>,
) {
    // First tick one period in, not immediately
    let mut ticker = keep_alive.map(|period| time::interval_at(Instant::now() + period, period));

    loop {
        tokio::select! {
            item = outbound.recv() => match item {
                Some(Outbound::Message(message)) => {
                    if let Err(e) = send_message(&mut sender, &message).await {
                        tracing::debug!("Send error, closing connection: {}", e);
                        break;
                    }
                }
                Some(Outbound::Close(reason)) => {
                    let _ = send_close(&mut sender, &reason).await;
                    break;
                }
                // Detached without a close request: the queue overflowed
                None => {
                    let _ = send_close(&mut sender, &CloseReason::Overflow).await;
                    break;
                }
            },
            _ = tick(&mut ticker) => {
                if send_message(&mut sender, &ServerMessage::KeepAlive).await.is_err() {
                    break;
                }
            }
        }
    }
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Send a JSON message over the WebSocket.
async fn send_message(
    sender: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(message).map_err(axum::Error::new)?;
    sender.send(Message::Text(json)).await
}

async fn send_close(
    sender: &mut SplitSink<WebSocket, Message>,
    reason: &CloseReason,
) -> Result<(), axum::Error> {
    sender
        .send(Message::Close(Some(CloseFrame {
            code: reason.code(),
            reason: reason.to_string().into(),
        })))
        .await
}

/// Create axum router for the WebSocket endpoint.
///
/// # Example
///
/// ```ignore
/// let app = Router::new()
///     .merge(websocket_router("/subscriptions"))
///     .with_state(state);
/// ```
pub fn websocket_router(path: &str) -> axum::Router<WebSocketState> {
    use axum::routing::get;

    axum::Router::new().route(path, get(ws_handler))
}
