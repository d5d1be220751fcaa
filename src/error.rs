//! Error types for boltstub
//!
//! Provides a unified error type for setup and wire-level operations.
//! Conversation outcomes (mismatches, timeouts) are not errors; they are
//! terminal states of the engine, see [`crate::engine::Failure`].

use thiserror::Error;

/// Result type alias using StubError
pub type Result<T> = std::result::Result<T, StubError>;

/// Unified error type for boltstub operations
#[derive(Debug, Error)]
pub enum StubError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Script Errors
    // -------------------------------------------------------------------------
    #[error("Script parse error at line {line}: {message}")]
    ScriptParse { line: usize, message: String },

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Handshake error: {0}")]
    Handshake(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Timed out after {0:?} of inactivity")]
    Timeout(std::time::Duration),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StubError {
    /// Build a script parse error for the given 1-based line
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        StubError::ScriptParse {
            line,
            message: message.into(),
        }
    }

    /// True if this error is a read/accept deadline expiring
    pub fn is_timeout(&self) -> bool {
        match self {
            StubError::Timeout(_) => true,
            StubError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }

    /// True if this error means the peer went away
    pub fn is_disconnect(&self) -> bool {
        match self {
            StubError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}
