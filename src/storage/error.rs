//! Storage error types

use thiserror::Error;

/// Errors that can occur during lookup cache operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Unexpected lookup file header in {path}: found '{found}'")]
    InvalidHeader { path: String, found: String },

    #[error("Lookup file writer lock was poisoned")]
    LockPoisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
