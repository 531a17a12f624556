//! Event bus adapters.
//!
//! Adapters implement the `EventBus` port for different deployments:
//!
//! - `InMemoryEventBus` - Process-local listener tables
//! - `RedisEventBus` - Multi-process fan-out through Redis pub/sub

mod in_memory;
mod redis;

pub use in_memory::InMemoryEventBus;
pub use self::redis::RedisEventBus;
