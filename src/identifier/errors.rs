//! Identifier parse errors

use thiserror::Error;

/// Result type for identifier parsing
pub type IdentifierResult<T> = Result<T, IdentifierError>;

/// Identifier errors
///
/// Only [`ObjectId::parse`](super::ObjectId::parse) returns these. Query
/// compilation and relation matching never raise them: malformed identifier
/// strings stay plain strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    /// Input is not exactly 24 characters
    #[error("Identifier must be 24 hex characters, got {0}")]
    InvalidLength(usize),

    /// Input contains a non-hex character
    #[error("Identifier contains non-hex characters: {0}")]
    InvalidHex(String),
}
