use std::path::PathBuf;
use thiserror::Error;

/// Custom error type for store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization Error: {0}")]
    Serialization(String),

    #[error("Corruption detected in {path:?} at line {line}: {details}")]
    Corruption {
        path: PathBuf,
        line: usize,
        details: String,
    },

    #[error("Invalid sample: {0}")]
    InvalidSample(String),

    #[error("Usage error: {op} called on {state} store")]
    InvalidState {
        op: &'static str,
        state: &'static str,
    },

    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

// Implement conversion from lock poison errors for convenience
impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        StoreError::LockError(format!("Mutex/RwLock poisoned: {}", err))
    }
}
