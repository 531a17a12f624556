//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the engine to external systems:
//! - `events` - Event bus implementations (in-memory, Redis)
//! - `websocket` - WebSocket transport and upgrade handler
//! - `http` - Publish and health endpoints, full router
//! - `executor` - Built-in query executor
//! - `auth` - Token validation and authenticating lifecycle hooks

pub mod auth;
pub mod events;
pub mod executor;
pub mod http;
pub mod websocket;

pub use auth::{StaticTokenValidator, TokenAuthHooks};
pub use events::{InMemoryEventBus, RedisEventBus};
pub use executor::PassthroughExecutor;
pub use websocket::{ConnectionSinks, WebSocketSettings, WebSocketState};
