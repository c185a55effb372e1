//! aerodoc - a typed access layer for document stores
//!
//! Queries are built as clause lists, compiled into the store's native
//! filter language by the grammar, and run through an injected
//! [`store::Connection`]. Relations between models resolve embedded
//! documents and references, one lookup per relation per batch.

pub mod clause;
pub mod cli;
pub mod config;
pub mod error;
pub mod grammar;
pub mod identifier;
pub mod model;
pub mod observability;
pub mod query;
pub mod relations;
pub mod store;

pub use error::{Error, Result};
