//! Relation key handling
//!
//! Keys are compared by canonical string form so an identifier stored as
//! `{"$oid": ..}` on one side and as a hex string on the other still match.
//! Only identifiers fold across representations. Every other key keeps its
//! JSON type in the canonical form, so `7` and `"7"` stay distinct, and
//! numbers compare by their JSON text (`7` and `7.0` differ) the same way
//! the store's equality does.

use serde_json::Value as Json;

use crate::clause::Value;
use crate::identifier::ObjectId;

/// Canonical comparison form of a key, tagged with its type; `None` for null
pub fn canonical_key(value: &Json) -> Option<String> {
    if let Some(id) = ObjectId::from_native(value) {
        return Some(format!("o:{}", id.to_hex()));
    }
    match value {
        Json::Null => None,
        Json::String(s) => Some(format!("s:{}", s)),
        Json::Number(n) => Some(format!("n:{}", n)),
        Json::Bool(b) => Some(format!("b:{}", b)),
        other => Some(format!("j:{}", other)),
    }
}

/// Operand for an owner-key lookup: identifier-shaped keys become identifiers
pub fn coerce_key(value: &Json) -> Value {
    match ObjectId::from_native(value) {
        Some(id) => Value::ObjectId(id),
        None => Value::from(value.clone()),
    }
}

/// Native storage form of a key written onto a record
pub fn native_key(value: &Json) -> Json {
    match ObjectId::from_native(value) {
        Some(id) => id.to_native(),
        None => value.clone(),
    }
}

/// Non-null keys held by a field: the elements of an array, or the value
pub fn keys_of(value: Option<&Json>) -> Vec<&Json> {
    match value {
        None | Some(Json::Null) => Vec::new(),
        Some(Json::Array(items)) => items.iter().filter(|v| !v.is_null()).collect(),
        Some(single) => vec![single],
    }
}

/// Keeps the first occurrence of each canonical key, in order
pub fn dedupe_keys<'a>(keys: impl IntoIterator<Item = &'a Json>) -> Vec<&'a Json> {
    let mut seen = std::collections::HashSet::new();
    keys.into_iter()
        .filter(|key| match canonical_key(key) {
            Some(canonical) => seen.insert(canonical),
            None => false,
        })
        .collect()
}
