//! Relationships between models
//!
//! A [`Relation`] describes how a parent record reaches related records:
//!
//! | kind                | parent field holds           | lookup          |
//! |---------------------|------------------------------|-----------------|
//! | `EmbeddedSingle`    | one sub-document             | none            |
//! | `EmbeddedMany`      | an array of sub-documents    | none            |
//! | `ReferenceSingle`   | one related key              | `owner $in ids` |
//! | `ReferenceMany`     | an array of related keys     | `owner $in ids` |
//! | `InverseReference`  | its owner's key              | `owner $in ids` |
//!
//! # Batch resolution
//!
//! Loading a relation for N parents issues at most one lookup. Keys are
//! deduplicated by canonical form; a batch with no keys issues none.
//! Dangling keys never fail: single relations resolve to null (or the
//! inverse reference's default) and many relations drop the miss.

mod descriptor;
mod eager;
mod errors;
mod keys;
mod mutation;
mod resolve;

pub use descriptor::{DefaultValue, Relation, RelationKind, RelationState};
pub use eager::{load_relations, EagerConstraint, EagerLoad};
pub use errors::RelationError;
pub use keys::{canonical_key, coerce_key, dedupe_keys, keys_of, native_key};
pub use mutation::SyncChanges;
