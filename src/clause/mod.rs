//! Clause intermediate representation
//!
//! Plain data describing predicates, sort keys, projections, and updates.
//! Nothing here touches the store; the grammar turns it into native
//! documents.

mod ast;
mod projection;
mod sort;
mod update;
mod value;

pub use ast::{Clause, ClauseKind, Combinator, GeoPoint, TypeTag};
pub use projection::ProjectionSpec;
pub use sort::{SortDirection, SortSpec};
pub use update::{is_operator, UpdateSpec};
pub use value::{date_from_native, date_to_native, Value, DATE_KEY};
