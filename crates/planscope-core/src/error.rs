//! Error types for planscope

use thiserror::Error;

/// Core error type for planscope operations
#[derive(Error, Debug)]
pub enum PlanscopeError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration file: {0}")]
    ConfigFormat(#[from] toml::de::Error),
}

/// Result type alias for planscope operations
pub type Result<T> = std::result::Result<T, PlanscopeError>;
