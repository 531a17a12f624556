//! Route definitions for the subscription server.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::adapters::websocket::{websocket_router, WebSocketState};

use super::handlers;

/// Creates the full application router.
///
/// # Routes
///
/// - `GET {ws_path}` - WebSocket upgrade (`graphql-ws`)
/// - `POST /publish/:topic` - Publish a JSON payload
/// - `GET /health` - Liveness and counts
pub fn router(state: WebSocketState, ws_path: &str) -> Router {
    Router::new()
        .merge(websocket_router(ws_path))
        .route("/publish/:topic", post(handlers::publish))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
