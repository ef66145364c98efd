//! Error types for the check-in store.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
///
/// None of these are swallowed inside the store and none are retried
/// automatically; [`StoreError::is_retryable`] tells the caller which ones
/// may succeed on a second attempt.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("timed out after {waited:?} waiting for write lock on {collection}")]
    LockTimeout { collection: String, waited: Duration },

    /// The collection file exists but cannot be decoded. Never treated as
    /// an empty collection.
    #[error("collection file {} is corrupt: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("limit exceeded: at most {limit} {what} per event")]
    LimitExceeded { what: &'static str, limit: usize },

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialize(String),
}

impl StoreError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Lock contention is the only transient failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::LockTimeout { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Convert an `io::Error` into `StoreError::Io` tagged with the given path.
macro_rules! io_err {
    ($path:expr) => {
        |source| $crate::error::StoreError::Io {
            path: $path.to_path_buf(),
            source,
        }
    };
}

pub(crate) use io_err;
