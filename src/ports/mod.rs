//! Ports - Interfaces for external collaborators.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the engine and the outside world. Adapters implement these ports.
//!
//! ## Event Ports
//!
//! - `EventBus` - Topic publish/subscribe (in-memory or broker fan-out)
//! - `EventListener` - Receives events for one topic binding
//!
//! ## Collaborator Ports
//!
//! - `QueryExecutor` - Produces subscription results per event
//! - `Transport` - Outbound delivery to client connections
//! - `LifecycleHooks` - Host callbacks for connect/subscribe/unsubscribe/disconnect
//! - `SessionValidator` - Token validation used by the auth hooks
//! - `FaultReporter` - Host-visible channel for faults with no owning connection

mod event_bus;
mod fault_reporter;
mod lifecycle_hooks;
mod query_executor;
mod session_validator;
mod transport;

pub use event_bus::{EventBus, EventListener, ListenerHandle};
pub use fault_reporter::FaultReporter;
pub use lifecycle_hooks::{LifecycleHooks, NoopHooks};
pub use query_executor::QueryExecutor;
pub use session_validator::SessionValidator;
pub use transport::{CloseReason, Transport};
