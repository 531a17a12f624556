//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `SUBSCRIPTIONS` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use subscriptions_engine::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Server running on {}", config.server.socket_addr().unwrap());
//! ```

mod auth;
mod engine;
mod error;
mod event_bus;
mod redis;
mod server;

pub use auth::AuthConfig;
pub use engine::EngineConfig;
pub use error::{ConfigError, ValidationError};
pub use event_bus::{EventBusBackend, EventBusConfig};
pub use self::redis::RedisConfig;
pub use server::{Environment, LogFormat, ServerConfig};

use serde::Deserialize;

/// Root application configuration
///
/// Every section has defaults, so an empty environment yields a working
/// single-process server. Load using [`AppConfig::load()`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment, logging)
    #[serde(default)]
    pub server: ServerConfig,

    /// WebSocket endpoint and per-connection limits
    #[serde(default)]
    pub engine: EngineConfig,

    /// Event bus backend (memory or Redis)
    #[serde(default)]
    pub event_bus: EventBusConfig,

    /// Connection authentication
    #[serde(default)]
    pub auth: AuthConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `SUBSCRIPTIONS` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `SUBSCRIPTIONS__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `SUBSCRIPTIONS__EVENT_BUS__BACKEND=redis` -> `event_bus.backend = redis`
    /// - `SUBSCRIPTIONS__AUTH__STATIC_TOKENS=alice:t1,bob:t2` -> two token entries
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("SUBSCRIPTIONS")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("auth.static_tokens"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for the first invalid section.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.engine.validate()?;
        self.event_bus.validate()?;
        self.auth.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}
