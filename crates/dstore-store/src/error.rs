/// Errors from backing store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Object IDs stored in the backing store must not be negative.
    #[error("invalid object ID: {0}")]
    InvalidObjectId(i64),

    /// A lock guarding the store was poisoned by a panicking writer.
    #[error("store lock poisoned: {0}")]
    LockPoisoned(String),

    /// The storage engine behind the trait failed.
    #[error("backend failure: {0}")]
    Backend(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
