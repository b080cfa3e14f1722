use thiserror::Error;

/// Errors from backend store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend-specific failure that is not a plain I/O error.
    #[error("backend error: {0}")]
    Backend(String),

    /// Storage backend is read-only or otherwise unavailable for writes.
    #[error("store is read-only")]
    ReadOnly,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
