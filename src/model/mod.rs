//! Models
//!
//! [`ModelSchema`] describes a collection and its relation registry;
//! [`Record`] is a hydrated document with a relation cache.

mod record;
mod schema;

pub use record::{Loaded, Record};
pub use schema::{ModelSchema, RelationFactory, DEFAULT_PRIMARY_KEY};
