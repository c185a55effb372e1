//! Clause operand values
//!
//! Operands keep their Rust-side type until compilation so the grammar can
//! apply identifier and temporal coercion. `to_native` produces the store's
//! own document form.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map};

use crate::identifier::ObjectId;

/// Native key used to tag timestamps inside documents
pub const DATE_KEY: &str = "$date";

/// An operand inside a clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    ObjectId(ObjectId),
    DateTime(DateTime<Utc>),
    Array(Vec<Value>),
    /// Verbatim native fragment (sub-documents, already-native values)
    Native(serde_json::Value),
}

impl Value {
    /// Converts to the store's native representation.
    ///
    /// Identifiers become `{"$oid": ..}`, timestamps become
    /// `{"$date": ..}` with millisecond precision. Non-finite floats become
    /// null.
    pub fn to_native(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => json!(i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::ObjectId(id) => id.to_native(),
            Value::DateTime(dt) => date_to_native(dt),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_native).collect())
            }
            Value::Native(v) => v.clone(),
        }
    }

    /// Returns the string payload, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// Native timestamp form: `{"$date": "<RFC 3339 millis, Z>"}`
pub fn date_to_native(dt: &DateTime<Utc>) -> serde_json::Value {
    json!({ DATE_KEY: dt.to_rfc3339_opts(SecondsFormat::Millis, true) })
}

/// Reads a native timestamp back
pub fn date_from_native(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    let map = value.as_object().filter(|m| m.len() == 1)?;
    let raw = map.get(DATE_KEY)?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                let native = serde_json::Value::Object(map);
                if let Some(dt) = date_from_native(&native) {
                    return Value::DateTime(dt);
                }
                if native.get(crate::identifier::OID_KEY).is_some() {
                    if let Some(id) = ObjectId::from_native(&native) {
                        return Value::ObjectId(id);
                    }
                }
                Value::Native(native)
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        value.to_native()
    }
}

impl From<Map<String, serde_json::Value>> for Value {
    fn from(map: Map<String, serde_json::Value>) -> Self {
        Value::from(serde_json::Value::Object(map))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Value::ObjectId(id)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Value::DateTime(dt)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Value::DateTime(dt.and_utc())
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::DateTime(d.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}
