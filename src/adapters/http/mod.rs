//! HTTP adapters - REST endpoints next to the WebSocket upgrade.

pub mod dto;
pub mod handlers;
pub mod routes;

pub use routes::router;
