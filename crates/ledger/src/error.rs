use thiserror::Error;

use crate::{Sequence, StreamKey};

/// Errors that can occur when interacting with the ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The expected stream sequence did not match the stored one.
    #[error(
        "Concurrency conflict on stream {stream}: expected sequence {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        stream: StreamKey,
        expected: Sequence,
        actual: Sequence,
    },

    /// The batch handed to `append` is malformed.
    #[error("Invalid append: {0}")]
    InvalidAppend(String),

    /// A required builder field was not set.
    #[error("Missing ledger entry field: {0}")]
    MissingField(&'static str),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backing store rejected the operation.
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
