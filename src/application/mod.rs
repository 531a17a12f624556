//! Application layer - Subscription registry, dispatch and connection lifecycle.
//!
//! This layer orchestrates domain types and coordinates between ports:
//!
//! - `ChannelResolver` - logical subscription name → topic bindings
//! - `SubscriptionRegistry` - entries, bus listeners, per-connection index
//! - `DispatchEngine` - filter → execute → deliver for each event
//! - `ConnectionLifecycleManager` - client protocol and lifecycle hooks
//! - `SubscriptionServer` - builder and facade tying the above together

mod dispatcher;
mod lifecycle;
mod registry;
mod resolver;
mod server;

pub use dispatcher::{DispatchEngine, DispatchOutcome, DispatchStats, SubscriptionListener};
pub use lifecycle::ConnectionLifecycleManager;
pub use registry::SubscriptionRegistry;
pub use resolver::{ChannelResolver, SetupFn};
pub use server::{SubscriptionServer, SubscriptionServerBuilder};
