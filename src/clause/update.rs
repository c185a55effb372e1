//! Update specifications

use serde::{Deserialize, Serialize};
use serde_json::Map;

use super::value::Value;

/// Field → new value, in insertion order.
///
/// Keys that start with `$` are store-native atomic operators (`$inc`,
/// `$push`, `$pull`, `$unset`, ...) and pass through compilation untouched.
/// All other keys are plain assignments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, serde_json::Value>", into = "Map<String, serde_json::Value>")]
pub struct UpdateSpec {
    entries: Vec<(String, Value)>,
}

impl UpdateSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns a field
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(field.into(), value.into());
        self
    }

    /// Adds an operator entry such as `("$inc", {"count": 1})`
    pub fn operator(mut self, operator: impl Into<String>, document: serde_json::Value) -> Self {
        self.push(operator.into(), Value::Native(document));
        self
    }

    fn push(&mut self, key: String, value: Value) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Plain field assignments
    pub fn assignments(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries
            .iter()
            .filter(|(k, _)| !is_operator(k))
            .map(|(k, v)| (k.as_str(), v))
    }

    /// Operator passthrough entries
    pub fn operators(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries
            .iter()
            .filter(|(k, _)| is_operator(k))
            .map(|(k, v)| (k.as_str(), v))
    }
}

/// Returns true for store-native operator keys
pub fn is_operator(key: &str) -> bool {
    key.starts_with('$')
}

impl From<Map<String, serde_json::Value>> for UpdateSpec {
    fn from(map: Map<String, serde_json::Value>) -> Self {
        let mut spec = UpdateSpec::new();
        for (key, value) in map {
            let value = if is_operator(&key) {
                Value::Native(value)
            } else {
                Value::from(value)
            };
            spec.push(key, value);
        }
        spec
    }
}

impl From<UpdateSpec> for Map<String, serde_json::Value> {
    fn from(spec: UpdateSpec) -> Self {
        spec.entries
            .into_iter()
            .map(|(k, v)| (k, v.to_native()))
            .collect()
    }
}
