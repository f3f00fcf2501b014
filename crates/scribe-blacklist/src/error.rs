//! Error types for the blacklist checker.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while checking blacklist integrity.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed configuration; fatal at initialization.
    #[error("configuration error: {0}")]
    Config(String),

    /// A required upstream plugin is absent; fatal at initialization.
    #[error("missing dependency: {0}")]
    MissingDependency(String),

    /// Controller-side failure reading chain state.
    #[error(transparent)]
    Chain(#[from] scribe_core::Error),

    /// JSON serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
