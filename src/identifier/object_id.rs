//! 12-byte document identifier
//!
//! A thin wrapper over `bson::oid::ObjectId` that adds the `{"$oid"}`
//! native JSON form and equality against hex strings.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use bson::oid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};

use super::errors::{IdentifierError, IdentifierResult};

/// Native key used to tag identifiers inside documents
pub const OID_KEY: &str = "$oid";

const HEX_LEN: usize = 24;

/// A 12-byte document identifier
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(oid::ObjectId);

impl ObjectId {
    /// Generates a fresh identifier
    pub fn new() -> Self {
        Self(oid::ObjectId::new())
    }

    /// Creates an identifier from raw bytes
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(oid::ObjectId::from_bytes(bytes))
    }

    /// Returns the raw bytes
    pub const fn bytes(&self) -> [u8; 12] {
        self.0.bytes()
    }

    /// Parses a 24-character hex string (either case).
    pub fn parse(s: &str) -> IdentifierResult<Self> {
        if s.len() != HEX_LEN {
            return Err(IdentifierError::InvalidLength(s.len()));
        }
        oid::ObjectId::parse_str(s)
            .map(Self)
            .map_err(|_| IdentifierError::InvalidHex(s.to_string()))
    }

    /// Returns true if `s` parses as an identifier
    pub fn is_valid(s: &str) -> bool {
        Self::parse(s).is_ok()
    }

    /// Lowercase 24-character hex form
    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }

    /// Creation time encoded in the first four bytes
    pub fn timestamp(&self) -> DateTime<Utc> {
        let millis = self.0.timestamp().timestamp_millis();
        DateTime::<Utc>::from_timestamp(millis.div_euclid(1000), 0).unwrap_or_default()
    }

    /// The wrapped `bson` identifier
    pub fn as_bson(&self) -> oid::ObjectId {
        self.0
    }

    /// Native document form: `{"$oid": "<hex>"}`
    pub fn to_native(&self) -> Value {
        json!({ OID_KEY: self.to_hex() })
    }

    /// Reads an identifier out of a native value.
    ///
    /// Accepts `{"$oid": "<hex>"}` and bare hex strings. Anything else,
    /// including malformed hex, yields `None`.
    pub fn from_native(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Self::parse(s).ok(),
            Value::Object(map) if map.len() == 1 => map
                .get(OID_KEY)
                .and_then(Value::as_str)
                .and_then(|s| Self::parse(s).ok()),
            _ => None,
        }
    }
}

impl From<oid::ObjectId> for ObjectId {
    fn from(id: oid::ObjectId) -> Self {
        Self(id)
    }
}

impl From<ObjectId> for oid::ObjectId {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}

impl PartialOrd for ObjectId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ObjectId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bytes().cmp(&other.bytes())
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl PartialEq<str> for ObjectId {
    fn eq(&self, other: &str) -> bool {
        Self::parse(other).map(|id| id == *self).unwrap_or(false)
    }
}

impl PartialEq<&str> for ObjectId {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

impl PartialEq<String> for ObjectId {
    fn eq(&self, other: &String) -> bool {
        self == other.as_str()
    }
}

impl PartialEq<ObjectId> for str {
    fn eq(&self, other: &ObjectId) -> bool {
        other == self
    }
}

impl PartialEq<ObjectId> for &str {
    fn eq(&self, other: &ObjectId) -> bool {
        other == *self
    }
}

impl PartialEq<ObjectId> for String {
    fn eq(&self, other: &ObjectId) -> bool {
        other == self.as_str()
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_native().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_native(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid identifier: {}", value)))
    }
}
