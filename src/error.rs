//! Error types shared across the crate

use thiserror::Error;

/// Result type for tool execution
pub type McpResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Errors that end a transport's run loop
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Session lookup failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The id is unknown or its session expired; the client must re-initialize
    #[error("session not found: {0}")]
    NotFound(String),
}
