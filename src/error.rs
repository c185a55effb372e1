//! Crate-level error type for terminal query and relation operations

use thiserror::Error;

use crate::grammar::GrammarError;
use crate::query::CursorError;
use crate::relations::RelationError;
use crate::store::StoreError;

/// Result type for terminal operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The clause list could not be compiled
    #[error(transparent)]
    Grammar(#[from] GrammarError),

    /// The connection rejected or failed the call
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Relation(#[from] RelationError),

    #[error(transparent)]
    Cursor(#[from] CursorError),

    /// Raised only by the `*_or_fail` lookups
    #[error("No document in '{collection}' matches {key}")]
    NotFound { collection: String, key: String },
}

impl Error {
    /// Stable code for responses and logs
    pub fn code(&self) -> &'static str {
        match self {
            Error::Grammar(e) => e.code().code(),
            Error::Store(_) => "AERO_STORE_FAILED",
            Error::Relation(_) => "AERO_RELATION_INVALID",
            Error::Cursor(_) => "AERO_CURSOR_INVALID",
            Error::NotFound { .. } => "AERO_NOT_FOUND",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}
