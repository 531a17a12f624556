//! Domain layer containing the engine's vocabulary.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (IDs, timestamps, errors, state machine)
//! - `event` - Topics and published events
//! - `subscription` - Requests, channel bindings and registry entries
//! - `connection` - Client connections and their handshake phase
//! - `protocol` - Messages exchanged with subscription clients

pub mod connection;
pub mod event;
pub mod foundation;
pub mod protocol;
pub mod subscription;
