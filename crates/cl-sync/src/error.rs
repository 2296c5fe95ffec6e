use thiserror::Error;

/// Errors produced by replication. Conflicts are results, never errors.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("ledger error: {0}")]
    Ledger(#[from] cl_ledger::LedgerError),

    #[error("store error: {0}")]
    Store(#[from] cl_store::StoreError),

    #[error("invalid replication config: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Returns `true` if rerunning the pass may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Ledger(e) => e.is_retryable(),
            Self::Store(e) => e.is_retryable(),
            _ => false,
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
