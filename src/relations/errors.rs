//! Relation errors

use thiserror::Error;

/// Errors raised by relation lookup and mutation.
///
/// Resolution itself never fails on missing or dangling keys; those
/// degrade to empty results or the configured default.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelationError {
    /// No relation registered under this name
    #[error("Relation '{name}' is not defined on model '{model}'")]
    NotFound { model: String, name: String },

    /// The operation does not apply to this relation kind
    #[error("{operation} is not supported by {kind} relations")]
    Unsupported {
        operation: &'static str,
        kind: &'static str,
    },

    /// A record needed for the operation has no value in `field`
    #[error("Record has no value for key '{field}'")]
    MissingKey { field: String },

    /// The embedded field holds something other than documents
    #[error("Field '{field}' does not hold embedded documents")]
    InvalidEmbedded { field: String },
}
