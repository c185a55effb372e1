//! Store boundary
//!
//! The access layer talks to a document store through the [`Connection`]
//! trait. [`MemoryStore`] is an in-process implementation that evaluates
//! native filters, updates and simple pipelines; it backs the test suite
//! and the CLI's dry runs.

mod connection;
mod errors;
mod matcher;
mod memory;
mod options;
mod sorter;
mod update;

pub use connection::{Connection, DeleteResult, Document, InsertResult, UpdateResult};
pub use errors::{StoreError, StoreResult};
pub use matcher::{resolve_path, NativeMatcher};
pub use memory::{MemoryStore, StoreCall};
pub use options::{FindOptions, UpdateOptions};
pub use sorter::{compare_values, DocumentSorter};
pub use update::apply_update;
