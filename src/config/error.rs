//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid bind address: {0}")]
    InvalidAddress(String),

    #[error("Invalid timeout: {0}")]
    InvalidTimeout(&'static str),

    #[error("Invalid Redis URL format")]
    InvalidRedisUrl,

    #[error("WebSocket path must start with '/'")]
    InvalidPath,

    #[error("Outbound buffer must hold at least one message")]
    InvalidBufferSize,

    #[error("Invalid static token entry: {0}")]
    InvalidStaticToken(String),

    #[error("Auth is required but no static tokens are configured")]
    NoTokensConfigured,
}
