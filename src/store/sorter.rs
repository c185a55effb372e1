//! Result sorting for the in-memory store
//!
//! Sorts documents by a native sort document, deterministically.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use super::matcher::resolve_path;

/// Sorts documents
pub struct DocumentSorter;

impl DocumentSorter {
    /// Sorts documents according to a native sort document
    /// (`{"field": 1 | -1, ...}`).
    ///
    /// Sort is stable; later keys break ties of earlier ones.
    pub fn sort(documents: &mut [Map<String, Value>], sort: &Map<String, Value>) {
        documents.sort_by(|a, b| {
            for (field, direction) in sort {
                let ordering = Self::compare_fields(a, b, field);
                let ordering = if direction.as_i64().unwrap_or(1) < 0 {
                    ordering.reverse()
                } else {
                    ordering
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
    }

    fn compare_fields(a: &Map<String, Value>, b: &Map<String, Value>, field: &str) -> Ordering {
        let a_val = resolve_path(a, field).into_iter().next();
        let b_val = resolve_path(b, field).into_iter().next();

        match (a_val, b_val) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a_val), Some(b_val)) => compare_values(a_val, b_val),
        }
    }
}

/// Cross-type ordering rank.
///
/// null < number < string < object < array < objectId < bool < date
pub fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(map) if map.len() == 1 && map.contains_key("$oid") => 5,
        Value::Object(map) if map.len() == 1 && map.contains_key("$date") => 7,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 6,
    }
}

/// Compares two native values.
///
/// Values of different type classes order by [`type_rank`]. Identifiers
/// compare by hex form, timestamps by their RFC 3339 text (fixed width,
/// UTC), objects and arrays are not compared.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    let (a_rank, b_rank) = (type_rank(a), type_rank(b));
    if a_rank != b_rank {
        return a_rank.cmp(&b_rank);
    }

    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(xi), Some(yi)) = (x.as_i64(), y.as_i64()) {
                return xi.cmp(&yi);
            }
            let xf = x.as_f64().unwrap_or(0.0);
            let yf = y.as_f64().unwrap_or(0.0);
            xf.partial_cmp(&yf).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Object(x), Value::Object(y)) if a_rank == 5 || a_rank == 7 => {
            let key = if a_rank == 5 { "$oid" } else { "$date" };
            let xs = x.get(key).and_then(Value::as_str).unwrap_or("");
            let ys = y.get(key).and_then(Value::as_str).unwrap_or("");
            xs.to_ascii_lowercase().cmp(&ys.to_ascii_lowercase())
        }
        _ => Ordering::Equal,
    }
}
