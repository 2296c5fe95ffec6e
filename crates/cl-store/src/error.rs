/// Errors from data store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing store cannot be reached. Transient: the caller may retry
    /// the whole operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// `create` was called with an id that is already present.
    #[error("document already exists: {collection}/{id}")]
    AlreadyExists { collection: String, id: String },

    /// A document could not be converted to or from its typed form.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A value passed to the store does not have the expected shape.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Returns `true` if retrying the failed operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
