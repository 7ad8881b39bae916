use thiserror::Error;

// Backend configuration and client setup
pub mod connection;

// JSON <-> DynamoDB attribute value conversions
pub mod conversions;

// Re-export connection configuration and factory functions
pub use connection::*;

/// Database error enum
#[derive(Debug, Clone, Error)]
pub enum DatabaseError {
    /// Unknown storage backend name
    #[error("Unsupported storage backend: {0}")]
    UnsupportedBackend(String),

    /// Invalid configuration value
    #[error("Database configuration error: {0}")]
    ConfigError(String),
}
