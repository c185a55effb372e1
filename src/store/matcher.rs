//! Native filter evaluation for the in-memory store
//!
//! Evaluates the subset of the native filter language the grammar emits:
//! `$and`, `$or`, `$nor`, `$not`, `$eq`, `$ne`, `$gt`, `$gte`, `$lt`,
//! `$lte`, `$in`, `$nin`, `$exists`, `$regex`/`$options`, `$size`, `$all`,
//! `$elemMatch`, `$type`. Unknown operators never match.
//!
//! Field paths may be dotted. An array met along the path fans out over
//! its elements, and equality against an array field also matches when the
//! array contains the value.

use std::cmp::Ordering;

use regex::RegexBuilder;
use serde_json::{Map, Value};

use super::sorter::{compare_values, type_rank};

/// Evaluates native filters against documents
pub struct NativeMatcher;

impl NativeMatcher {
    /// Checks if a document matches a native filter
    pub fn matches(document: &Map<String, Value>, filter: &Map<String, Value>) -> bool {
        filter
            .iter()
            .all(|(key, condition)| Self::matches_entry(document, key, condition))
    }

    fn matches_entry(document: &Map<String, Value>, key: &str, condition: &Value) -> bool {
        match key {
            "$and" => Self::sub_filters(condition).all(|f| Self::matches(document, f)),
            "$or" => Self::sub_filters(condition).any(|f| Self::matches(document, f)),
            "$nor" => !Self::sub_filters(condition).any(|f| Self::matches(document, f)),
            k if k.starts_with('$') => false,
            path => {
                let candidates = resolve_path(document, path);
                if is_operator_doc(condition) {
                    Self::matches_operators(&candidates, condition)
                } else {
                    equals_any(&candidates, condition)
                }
            }
        }
    }

    fn sub_filters(condition: &Value) -> impl Iterator<Item = &Map<String, Value>> {
        condition
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(Value::as_object)
    }

    /// Every operator in `ops` must hold for the candidates
    fn matches_operators(candidates: &[&Value], ops: &Value) -> bool {
        let Some(ops) = ops.as_object() else {
            return false;
        };
        ops.iter().all(|(op, arg)| match op.as_str() {
            "$eq" => equals_any(candidates, arg),
            "$ne" => !equals_any(candidates, arg),
            "$gt" => compare_any(candidates, arg, |o| o == Ordering::Greater),
            "$gte" => compare_any(candidates, arg, |o| o != Ordering::Less),
            "$lt" => compare_any(candidates, arg, |o| o == Ordering::Less),
            "$lte" => compare_any(candidates, arg, |o| o != Ordering::Greater),
            "$in" => arg
                .as_array()
                .map(|items| items.iter().any(|item| equals_any(candidates, item)))
                .unwrap_or(false),
            "$nin" => arg
                .as_array()
                .map(|items| !items.iter().any(|item| equals_any(candidates, item)))
                .unwrap_or(false),
            "$exists" => arg.as_bool().unwrap_or(true) == !candidates.is_empty(),
            "$regex" => {
                let flags = ops.get("$options").and_then(Value::as_str).unwrap_or("");
                regex_any(candidates, arg.as_str().unwrap_or(""), flags)
            }
            "$options" => true,
            "$not" => !Self::matches_operators(candidates, arg),
            "$size" => candidates.iter().any(|c| {
                c.as_array()
                    .map(|a| Some(a.len() as u64) == arg.as_u64())
                    .unwrap_or(false)
            }),
            "$all" => arg
                .as_array()
                .map(|wanted| wanted.iter().all(|w| equals_any(candidates, w)))
                .unwrap_or(false),
            "$elemMatch" => candidates.iter().any(|c| {
                c.as_array()
                    .map(|items| items.iter().any(|item| Self::element_matches(item, arg)))
                    .unwrap_or(false)
            }),
            "$type" => arg
                .as_str()
                .map(|alias| candidates.iter().any(|c| type_matches(c, alias)))
                .unwrap_or(false),
            _ => false,
        })
    }

    fn element_matches(element: &Value, condition: &Value) -> bool {
        match (element, condition) {
            (Value::Object(doc), Value::Object(filter)) if !is_operator_doc(condition) => {
                Self::matches(doc, filter)
            }
            _ => Self::matches_operators(&[element], condition),
        }
    }
}

/// True when `value` is an operator document rather than a literal
pub fn is_operator_doc(value: &Value) -> bool {
    match value.as_object() {
        Some(map) => {
            map.keys().next().map(|k| k.starts_with('$')).unwrap_or(false)
                && !is_tagged_scalar(map)
        }
        None => false,
    }
}

/// `{"$oid": ..}` and `{"$date": ..}` are values, not operators
pub fn is_tagged_scalar(map: &Map<String, Value>) -> bool {
    map.len() == 1 && (map.contains_key("$oid") || map.contains_key("$date"))
}

/// Collects every value reachable through a dotted path
pub fn resolve_path<'a>(document: &'a Map<String, Value>, path: &str) -> Vec<&'a Value> {
    let mut segments = path.split('.');
    let Some(first) = segments.next() else {
        return Vec::new();
    };
    let mut current: Vec<&Value> = document.get(first).into_iter().collect();

    for segment in segments {
        let mut next = Vec::new();
        for value in current {
            match value {
                Value::Object(map) => next.extend(map.get(segment)),
                Value::Array(items) => {
                    if let Ok(index) = segment.parse::<usize>() {
                        next.extend(items.get(index));
                    }
                    for item in items {
                        if let Value::Object(map) = item {
                            next.extend(map.get(segment));
                        }
                    }
                }
                _ => {}
            }
        }
        current = next;
    }
    current
}

fn equals_any(candidates: &[&Value], target: &Value) -> bool {
    if candidates.is_empty() {
        return target.is_null();
    }
    candidates.iter().any(|c| {
        *c == target
            || c
                .as_array()
                .map(|items| items.iter().any(|item| item == target))
                .unwrap_or(false)
    })
}

fn compare_any(candidates: &[&Value], bound: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    let expanded = candidates.iter().flat_map(|c| match c {
        Value::Array(items) => items.iter().collect::<Vec<_>>(),
        other => vec![*other],
    });
    for value in expanded {
        // Range operators only compare values of the same type class
        if type_rank(value) == type_rank(bound) && accept(compare_values(value, bound)) {
            return true;
        }
    }
    false
}

fn regex_any(candidates: &[&Value], pattern: &str, flags: &str) -> bool {
    let regex = RegexBuilder::new(pattern)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .ignore_whitespace(flags.contains('x'))
        .build();
    let Ok(regex) = regex else {
        return false;
    };
    candidates.iter().any(|c| match c {
        Value::String(s) => regex.is_match(s),
        Value::Array(items) => items
            .iter()
            .any(|item| item.as_str().map(|s| regex.is_match(s)).unwrap_or(false)),
        _ => false,
    })
}

fn type_matches(value: &Value, alias: &str) -> bool {
    match (alias, value) {
        ("null", Value::Null) => true,
        ("bool", Value::Bool(_)) => true,
        ("number", Value::Number(_)) => true,
        ("int" | "long", Value::Number(n)) => n.is_i64() || n.is_u64(),
        ("double", Value::Number(n)) => n.is_f64(),
        ("string", Value::String(_)) => true,
        ("array", Value::Array(_)) => true,
        ("objectId", Value::Object(m)) => m.len() == 1 && m.contains_key("$oid"),
        ("date", Value::Object(m)) => m.len() == 1 && m.contains_key("$date"),
        ("object", Value::Object(m)) => !is_tagged_scalar(m),
        _ => false,
    }
}
