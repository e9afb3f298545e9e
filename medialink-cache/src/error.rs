//! Error types for the cache layer.

use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur in cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row could not be turned back into a domain value.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// The store is not reachable (lock poisoned, worker gone, injected failure).
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    /// The call did not complete within its deadline.
    #[error("cache operation timed out after {0} ms")]
    Timeout(u64),
}
