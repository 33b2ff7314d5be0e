//! Common error types for Rendezvous.

use thiserror::Error;

/// Result type alias using Rendezvous' error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for relay operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A group with this key is already registered
    #[error("group already exists: {0}")]
    AlreadyExists(String),

    /// Group or peer not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Envelope or request body could not be decoded
    #[error("malformed input: {0}")]
    Malformed(String),

    /// Write to a peer channel failed
    #[error("transport error: {0}")]
    Transport(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create an already-exists error from any displayable type.
    pub fn already_exists(msg: impl std::fmt::Display) -> Self {
        Self::AlreadyExists(msg.to_string())
    }

    /// Create a not found error from any displayable type.
    pub fn not_found(msg: impl std::fmt::Display) -> Self {
        Self::NotFound(msg.to_string())
    }

    /// Create a malformed-input error from any displayable type.
    pub fn malformed(msg: impl std::fmt::Display) -> Self {
        Self::Malformed(msg.to_string())
    }

    /// Create a transport error from any displayable type.
    pub fn transport(msg: impl std::fmt::Display) -> Self {
        Self::Transport(msg.to_string())
    }

    /// Create a configuration error from any displayable type.
    pub fn config(msg: impl std::fmt::Display) -> Self {
        Self::Config(msg.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}
