//! Query builder for aerodoc
//!
//! [`QueryBuilder`] accumulates clauses, ordering, projection and
//! pagination for one model, compiles them through the grammar on every
//! terminal call, and runs them against an injected
//! [`Connection`](crate::store::Connection).

mod aggregate;
mod builder;
mod pagination;

pub use aggregate::{build_pipeline, AggregateFunction, AggregateStages, AGGREGATE_FIELD};
pub use builder::QueryBuilder;
pub use pagination::{keyset_clause, page_offset, Cursor, CursorError, CursorPage, Page};
