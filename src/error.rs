//! Error types for wirecall.

use thiserror::Error;

/// Main error type for all wirecall operations.
#[derive(Debug, Error)]
pub enum WirecallError {
    /// I/O error during transport, file, or console operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error (setup handshake only).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed or unsupported connect target.
    #[error("Invalid target: {0}")]
    Target(String),

    /// Metadata entry that cannot be composed.
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// Protocol error (invalid frame, unexpected signal, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Error frame received from the remote, passed through uninterpreted.
    #[error("Remote error: {0}")]
    Remote(String),

    /// Connection closed while responses were still expected.
    #[error("Connection closed")]
    ConnectionClosed,
}

/// Result type alias using WirecallError.
pub type Result<T> = std::result::Result<T, WirecallError>;
