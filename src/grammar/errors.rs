//! Grammar error types
//!
//! Error codes:
//! - AERO_QUERY_UNSUPPORTED_OPERATOR (REJECT)
//! - AERO_QUERY_AMBIGUOUS_PROJECTION (REJECT)
//! - AERO_QUERY_INVALID (REJECT)
//!
//! Every grammar error rejects the whole compile. Nothing is partially
//! applied or silently corrected.

use std::fmt;

/// Severity levels for grammar errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Caller request rejected
    Reject,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
        }
    }
}

/// Grammar error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrammarErrorCode {
    /// Comparison operator outside the mapping table
    AeroQueryUnsupportedOperator,
    /// Projection mixes include and exclude
    AeroQueryAmbiguousProjection,
    /// Malformed query structure
    AeroQueryInvalid,
}

impl GrammarErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            GrammarErrorCode::AeroQueryUnsupportedOperator => "AERO_QUERY_UNSUPPORTED_OPERATOR",
            GrammarErrorCode::AeroQueryAmbiguousProjection => "AERO_QUERY_AMBIGUOUS_PROJECTION",
            GrammarErrorCode::AeroQueryInvalid => "AERO_QUERY_INVALID",
        }
    }

    pub fn severity(&self) -> Severity {
        Severity::Reject
    }
}

impl fmt::Display for GrammarErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Grammar error with context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarError {
    code: GrammarErrorCode,
    message: String,
    field: Option<String>,
}

impl GrammarError {
    /// Unknown comparison operator
    pub fn unsupported_operator(field: impl Into<String>, operator: impl Into<String>) -> Self {
        let f = field.into();
        Self {
            code: GrammarErrorCode::AeroQueryUnsupportedOperator,
            message: format!("Operator '{}' is not supported on field '{}'", operator.into(), f),
            field: Some(f),
        }
    }

    /// Projection mixes inclusion and exclusion
    pub fn ambiguous_projection(included: &str, excluded: &str) -> Self {
        Self {
            code: GrammarErrorCode::AeroQueryAmbiguousProjection,
            message: format!(
                "Projection cannot include '{}' and exclude '{}' at the same time",
                included, excluded
            ),
            field: Some(excluded.to_string()),
        }
    }

    /// Malformed query structure
    pub fn query_invalid(reason: impl Into<String>) -> Self {
        Self {
            code: GrammarErrorCode::AeroQueryInvalid,
            message: reason.into(),
            field: None,
        }
    }

    pub fn code(&self) -> GrammarErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }
}

impl fmt::Display for GrammarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )
    }
}

impl std::error::Error for GrammarError {}

/// Result type for grammar operations
pub type GrammarResult<T> = Result<T, GrammarError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            GrammarErrorCode::AeroQueryUnsupportedOperator.code(),
            "AERO_QUERY_UNSUPPORTED_OPERATOR"
        );
        assert_eq!(
            GrammarErrorCode::AeroQueryAmbiguousProjection.code(),
            "AERO_QUERY_AMBIGUOUS_PROJECTION"
        );
    }

    #[test]
    fn test_error_display() {
        let err = GrammarError::unsupported_operator("age", "~=");
        let display = format!("{}", err);
        assert!(display.contains("REJECT"));
        assert!(display.contains("AERO_QUERY_UNSUPPORTED_OPERATOR"));
        assert!(display.contains("~="));
        assert_eq!(err.field(), Some("age"));
    }
}
