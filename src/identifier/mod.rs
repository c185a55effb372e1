//! Document identifiers for aerodoc
//!
//! A document identifier is a 12-byte `bson` ObjectId:
//!
//! | bytes | content                              |
//! |-------|--------------------------------------|
//! | 0..4  | seconds since the Unix epoch (BE)    |
//! | 4..9  | random value, fixed per process      |
//! | 9..12 | counter, seeded randomly (BE)        |
//!
//! Identifiers compare by their canonical bytes. The 24-character hex form
//! and the parsed form of the same identifier are equal.

mod errors;
mod object_id;

pub use errors::{IdentifierError, IdentifierResult};
pub use object_id::{ObjectId, OID_KEY};
