//! Clause compiler (grammar) for aerodoc
//!
//! Translates clause lists into the store's native filter documents, and
//! sort, projection, and update specs into their native forms.
//!
//! # Combination policy
//!
//! | AND bucket | OR bucket | output                                   |
//! |------------|-----------|------------------------------------------|
//! | 1          | 0         | the clause verbatim                      |
//! | n > 1      | 0         | `{"$and": [...]}`                        |
//! | 0          | 1         | the clause verbatim                      |
//! | 0          | n > 1     | `{"$or": [...]}`                         |
//! | ≥ 1        | ≥ 1       | `{"$and": [<and>, {"$or": [...]}]}`      |
//!
//! # Coercion
//!
//! - Valid 24-hex strings compared against the primary key become
//!   identifiers; invalid strings pass through.
//! - Timestamps become native dates.

mod compiler;
mod errors;
mod pattern;

pub use compiler::{coerce_identifier, ComparisonOperator, Grammar, NativeFilter};
pub use errors::{GrammarError, GrammarErrorCode, GrammarResult, Severity};
pub use pattern::like_to_regex;
