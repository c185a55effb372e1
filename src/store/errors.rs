//! Store errors

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by a store connection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The connection does not implement an operator or stage
    #[error("Unsupported by this store: {0}")]
    Unsupported(String),

    /// A document or update could not be applied
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// Unique key already present
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// Driver or transport failure
    #[error("Store failure: {0}")]
    Internal(String),
}
