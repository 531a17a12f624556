//! WebSocket transport for subscription clients.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     SubscriptionServer                           │
//! │   DispatchEngine / ConnectionLifecycleManager                    │
//! └──────────────────────────────────────────────────────────────────┘
//!              │ Transport::send                ▲ handle_raw
//!              ▼                                │
//! ┌──────────────────────────────┐   ┌──────────────────────────────┐
//! │      ConnectionSinks         │   │        reader task           │
//! │  bounded queue per client    │   │   text frames → lifecycle    │
//! └──────────────────────────────┘   └──────────────────────────────┘
//!              │                                ▲
//!              ▼                                │
//!        writer task ─────────▶ socket ─────────┘
//! ```
//!
//! # Components
//!
//! - [`sinks`] - Outbound queues implementing the `Transport` port
//! - [`handler`] - Axum WebSocket upgrade handler and connection loop

pub mod handler;
pub mod sinks;

pub use handler::{
    websocket_router, ws_handler, WebSocketSettings, WebSocketState, GRAPHQL_WS_PROTOCOL,
};
pub use sinks::{ConnectionSinks, Outbound};
