//! Client-wide error types

use thiserror::Error;

/// Error type surfaced by every fallible operation in this crate
#[derive(Error, Debug)]
pub enum UnmeshedError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Registration failed: {0}")]
    Registration(String),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Engine returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Handler error: {0}")]
    Handler(String),

    #[error("Client already started")]
    AlreadyStarted,

    #[error("Shutdown error: {0}")]
    Shutdown(String),
}

/// Result type alias for UnmeshedError
pub type Result<T> = std::result::Result<T, UnmeshedError>;
