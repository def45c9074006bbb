//! Error types for wirekv
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using WireError
pub type Result<T> = std::result::Result<T, WireError>;

/// Unified error type for wirekv operations
#[derive(Debug, Error)]
pub enum WireError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    /// Framing-level violation (bad magic, bogus length). The byte stream
    /// cannot be realigned; the connection must be torn down.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Malformed payload inside a well-framed message (e.g. a key length
    /// exceeding the remaining bytes). The stream is still aligned.
    #[error("Payload error: {0}")]
    Payload(String),

    // -------------------------------------------------------------------------
    // Request Errors
    // -------------------------------------------------------------------------
    /// The peer answered with an ERROR frame.
    #[error("Remote error {code}: {message}")]
    Remote { code: u16, message: String },

    #[error("Request timed out")]
    Timeout,

    /// The connection closed while requests were still outstanding.
    #[error("Connection closed")]
    ConnectionClosed,

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
