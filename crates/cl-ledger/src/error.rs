use cl_store::StoreError;
use cl_types::TypeError;

/// Errors produced by ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The named record type has no change tracking configured.
    #[error("model {0:?} has no change tracking configured")]
    RequiredModelMissing(String),

    #[error("invalid checkpoint: {0}")]
    Checkpoint(#[from] TypeError),
}

impl LedgerError {
    /// Returns `true` if retrying the whole operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_retryable(),
            _ => false,
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
