//! Error types for the vector store

use thiserror::Error;

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Error types that can occur in store operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("user id {user_id} is already bound to a label")]
    DuplicateIdentifier { user_id: u64 },

    #[error("index capacity of {capacity} elements exceeded")]
    CapacityExceeded { capacity: usize },

    #[error("label {label} is out of range (next label: {next_label})")]
    LabelOutOfRange { label: u64, next_label: u64 },

    #[error("index error: {0}")]
    IndexError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("persistence error: {0}")]
    PersistenceError(String),
}
