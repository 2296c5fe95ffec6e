use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid digest length: expected {expected} hex chars, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// Checkpoint sequences start at 1.
    #[error("invalid checkpoint sequence: {0}")]
    InvalidSequence(u64),
}
