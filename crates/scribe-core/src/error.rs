//! Error types shared across the scribe crates.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the shared chain types.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed account name.
    #[error("invalid account name: {0}")]
    Name(String),

    /// Malformed or inconsistent ABI descriptor.
    #[error("ABI error: {0}")]
    Abi(String),

    /// A binary payload ended early or contained out-of-range data.
    #[error("stream error: {0}")]
    Stream(String),

    /// Controller-side failure (table read, missing data).
    #[error("chain error: {0}")]
    Chain(String),

    /// ABI decoding exceeded the configured time budget.
    #[error("ABI decoding exceeded the {0:?} time budget")]
    DeadlineExceeded(std::time::Duration),
}
