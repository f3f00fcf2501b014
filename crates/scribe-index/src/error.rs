//! Error types for the indexer pipeline.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while indexing chain data.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed configuration; fatal at initialization.
    #[error("configuration error: {0}")]
    Config(String),

    /// Document store transport failure.
    #[error("connection error: {0}")]
    Connection(#[from] reqwest::Error),

    /// Non-2xx response from the document store.
    #[error("response code {status}: {body}")]
    ResponseCode { status: u16, body: String },

    /// One or more items of a bulk request failed.
    #[error("bulk perform error num: {0}")]
    BulkFail(usize),

    /// A required upstream plugin is absent; fatal at initialization.
    #[error("missing dependency: {0}")]
    MissingDependency(String),

    /// JSON serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Chain type or ABI error.
    #[error(transparent)]
    Chain(#[from] scribe_core::Error),
}
