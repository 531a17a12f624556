//! Subscriptions Engine - Real-time subscription dispatch
//!
//! Clients open a WebSocket, authenticate once, and register subscriptions
//! against logical names. Publishers push events onto topics; every event
//! is filtered per subscription, executed, and delivered only to the
//! connections it matches.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
