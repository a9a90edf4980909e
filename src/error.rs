//! Error types for a3s-audit

use thiserror::Error;

/// Errors that can occur while configuring or running the audit layer
#[derive(Debug, Error)]
pub enum AuditError {
    /// Configuration error (missing store, malformed filter registration)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Audit store write failure
    #[error("Audit store error: {0}")]
    Store(String),

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// File I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Store backend connection failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// Publishing an audit record to a backend failed
    #[error("Failed to publish audit record to subject '{subject}': {reason}")]
    Publish {
        subject: String,
        reason: String,
    },

    /// Timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// No endpoint is bound to the destination address
    #[error("No endpoint bound to address '{0}'")]
    NoEndpoint(String),

    /// A message handler failed
    #[error("Handler at '{address}' failed: {reason}")]
    Handler {
        address: String,
        reason: String,
    },
}

/// Result type alias for audit operations
pub type Result<T> = std::result::Result<T, AuditError>;
