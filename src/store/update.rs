//! Native update application for the in-memory store
//!
//! Supports `$set` (including the positional `field.$` form), `$unset`,
//! `$inc`, `$push`, `$addToSet` (with `$each`), and `$pull`. An update
//! without operator keys replaces the document, keeping its `_id`.

use serde_json::{Map, Value};

use super::errors::{StoreError, StoreResult};
use super::matcher::{is_operator_doc, NativeMatcher};

/// Applies `update` to `document`. `filter` resolves positional paths.
///
/// Returns whether the document changed.
pub fn apply_update(
    document: &mut Map<String, Value>,
    update: &Map<String, Value>,
    filter: &Map<String, Value>,
) -> StoreResult<bool> {
    let before = document.clone();

    if !update.keys().any(|k| k.starts_with('$')) {
        let id = document.get("_id").cloned();
        *document = update.clone();
        if let Some(id) = id {
            document.insert("_id".into(), id);
        }
        return Ok(*document != before);
    }

    for (op, fields) in update {
        let fields = fields
            .as_object()
            .ok_or_else(|| StoreError::InvalidDocument(format!("{} expects a document", op)))?;

        for (path, arg) in fields {
            let path = resolve_positional(document, path, filter)?;
            match op.as_str() {
                "$set" => set_path(document, &path, arg.clone())?,
                "$unset" => unset_path(document, &path),
                "$inc" => increment(document, &path, arg)?,
                "$push" => push(document, &path, arg, false)?,
                "$addToSet" => push(document, &path, arg, true)?,
                "$pull" => pull(document, &path, arg)?,
                other => return Err(StoreError::Unsupported(format!("update operator {}", other))),
            }
        }
    }

    Ok(*document != before)
}

/// Replaces a `.$` segment with the index of the first array element that
/// satisfies the filter conditions on that array.
fn resolve_positional(
    document: &Map<String, Value>,
    path: &str,
    filter: &Map<String, Value>,
) -> StoreResult<String> {
    let Some(pos) = path.find(".$") else {
        return Ok(path.to_string());
    };
    let prefix = &path[..pos];
    let rest = &path[pos + 2..];

    let mut conditions = Map::new();
    collect_conditions(filter, &format!("{}.", prefix), &mut conditions);

    let items = get_path(document, prefix)
        .and_then(Value::as_array)
        .ok_or_else(|| StoreError::InvalidDocument(format!("'{}' is not an array", prefix)))?;

    let index = items
        .iter()
        .position(|item| match item {
            Value::Object(element) => NativeMatcher::matches(element, &conditions),
            _ => false,
        })
        .ok_or_else(|| {
            StoreError::InvalidDocument(format!("no element of '{}' matches the filter", prefix))
        })?;

    Ok(format!("{}.{}{}", prefix, index, rest))
}

/// Gathers `prefix.*` conditions, looking through `$and`
fn collect_conditions(filter: &Map<String, Value>, prefix: &str, out: &mut Map<String, Value>) {
    for (key, condition) in filter {
        if key == "$and" {
            for sub in condition.as_array().into_iter().flatten() {
                if let Value::Object(sub) = sub {
                    collect_conditions(sub, prefix, out);
                }
            }
        } else if let Some(field) = key.strip_prefix(prefix) {
            out.insert(field.to_string(), condition.clone());
        }
    }
}

fn get_path<'a>(document: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn get_path_mut<'a>(document: &'a mut Map<String, Value>, path: &str) -> Option<&'a mut Value> {
    let mut segments = path.split('.');
    let mut current = document.get_mut(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get_mut(segment)?,
            Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Sets a dotted path, creating intermediate documents
fn set_path(document: &mut Map<String, Value>, path: &str, value: Value) -> StoreResult<()> {
    if path.is_empty() {
        return Err(StoreError::InvalidDocument("empty field path".into()));
    }
    set_in_map(document, path, value, path)
}

fn set_in_map(
    map: &mut Map<String, Value>,
    path: &str,
    value: Value,
    full: &str,
) -> StoreResult<()> {
    match path.split_once('.') {
        None => {
            map.insert(path.to_string(), value);
            Ok(())
        }
        Some((head, rest)) => {
            let entry = map
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            set_in_value(entry, rest, value, full)
        }
    }
}

/// Array segments must be numeric indexes of existing elements
fn set_in_value(target: &mut Value, path: &str, value: Value, full: &str) -> StoreResult<()> {
    match target {
        Value::Object(map) => set_in_map(map, path, value, full),
        Value::Array(items) => {
            let (head, rest) = match path.split_once('.') {
                Some((head, rest)) => (head, Some(rest)),
                None => (path, None),
            };
            let slot = head
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get_mut(index))
                .ok_or_else(|| {
                    StoreError::InvalidDocument(format!("bad array index '{}' in '{}'", head, full))
                })?;
            match rest {
                None => {
                    *slot = value;
                    Ok(())
                }
                Some(rest) => set_in_value(slot, rest, value, full),
            }
        }
        _ => Err(StoreError::InvalidDocument(format!(
            "cannot traverse '{}'",
            full
        ))),
    }
}

fn unset_path(document: &mut Map<String, Value>, path: &str) {
    match path.rsplit_once('.') {
        None => {
            document.remove(path);
        }
        Some((parent, last)) => {
            if let Some(Value::Object(map)) = get_path_mut(document, parent) {
                map.remove(last);
            }
        }
    }
}

fn increment(document: &mut Map<String, Value>, path: &str, by: &Value) -> StoreResult<()> {
    let current = get_path(document, path).cloned().unwrap_or(Value::from(0));
    let next = match (current.as_i64(), by.as_i64()) {
        (Some(a), Some(b)) => Value::from(a + b),
        _ => {
            let a = current.as_f64().ok_or_else(|| {
                StoreError::InvalidDocument(format!("cannot increment non-numeric '{}'", path))
            })?;
            let b = by
                .as_f64()
                .ok_or_else(|| StoreError::InvalidDocument("$inc expects a number".into()))?;
            Value::from(a + b)
        }
    };
    set_path(document, path, next)
}

fn push(document: &mut Map<String, Value>, path: &str, arg: &Value, unique: bool) -> StoreResult<()> {
    let values: Vec<Value> = match arg.as_object().and_then(|m| m.get("$each")) {
        Some(Value::Array(each)) => each.clone(),
        Some(_) => return Err(StoreError::InvalidDocument("$each expects an array".into())),
        None => vec![arg.clone()],
    };

    if get_path(document, path).is_none() {
        set_path(document, path, Value::Array(Vec::new()))?;
    }
    let items = get_path_mut(document, path)
        .and_then(Value::as_array_mut)
        .ok_or_else(|| StoreError::InvalidDocument(format!("'{}' is not an array", path)))?;

    for value in values {
        if !unique || !items.contains(&value) {
            items.push(value);
        }
    }
    Ok(())
}

fn pull(document: &mut Map<String, Value>, path: &str, condition: &Value) -> StoreResult<()> {
    let Some(items) = get_path_mut(document, path).and_then(Value::as_array_mut) else {
        return Ok(());
    };

    items.retain(|item| !pull_matches(item, condition));
    Ok(())
}

fn pull_matches(item: &Value, condition: &Value) -> bool {
    if is_operator_doc(condition) {
        let mut wrapper = Map::new();
        wrapper.insert("v".into(), item.clone());
        let mut filter = Map::new();
        filter.insert("v".into(), condition.clone());
        return NativeMatcher::matches(&wrapper, &filter);
    }
    match (item, condition) {
        (Value::Object(element), Value::Object(filter)) if element != filter => {
            NativeMatcher::matches(element, filter)
        }
        _ => item == condition,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn apply(document: Value, update: Value, filter: Value) -> Value {
        let mut d = map(document);
        apply_update(&mut d, &map(update), &map(filter)).unwrap();
        Value::Object(d)
    }

    #[test]
    fn test_set_and_unset() {
        let out = apply(
            json!({"_id": 1, "a": 1, "tmp": true}),
            json!({"$set": {"a": 2, "profile.city": "Oslo"}, "$unset": {"tmp": ""}}),
            json!({}),
        );
        assert_eq!(out, json!({"_id": 1, "a": 2, "profile": {"city": "Oslo"}}));
    }

    #[test]
    fn test_inc() {
        let out = apply(json!({"n": 1}), json!({"$inc": {"n": 2, "m": 1}}), json!({}));
        assert_eq!(out, json!({"n": 3, "m": 1}));
    }

    #[test]
    fn test_push_add_to_set_and_pull() {
        let out = apply(
            json!({"tags": ["a"]}),
            json!({"$addToSet": {"tags": {"$each": ["a", "b"]}}}),
            json!({}),
        );
        assert_eq!(out, json!({"tags": ["a", "b"]}));

        let out = apply(json!({}), json!({"$push": {"tags": "x"}}), json!({}));
        assert_eq!(out, json!({"tags": ["x"]}));

        let out = apply(
            json!({"tags": ["a", "b", "c"]}),
            json!({"$pull": {"tags": {"$in": ["a", "c"]}}}),
            json!({}),
        );
        assert_eq!(out, json!({"tags": ["b"]}));
    }

    #[test]
    fn test_pull_by_condition() {
        let out = apply(
            json!({"comments": [{"_id": 1}, {"_id": 2}]}),
            json!({"$pull": {"comments": {"_id": {"$in": [1]}}}}),
            json!({}),
        );
        assert_eq!(out, json!({"comments": [{"_id": 2}]}));
    }

    #[test]
    fn test_positional_set() {
        let out = apply(
            json!({"_id": 9, "comments": [{"_id": 1, "body": "a"}, {"_id": 2, "body": "b"}]}),
            json!({"$set": {"comments.$": {"_id": 2, "body": "edited"}}}),
            json!({"$and": [{"_id": 9}, {"comments._id": 2}]}),
        );
        assert_eq!(
            out,
            json!({"_id": 9, "comments": [{"_id": 1, "body": "a"}, {"_id": 2, "body": "edited"}]})
        );
    }

    #[test]
    fn test_replacement_keeps_id() {
        let out = apply(json!({"_id": 1, "a": 1}), json!({"b": 2}), json!({}));
        assert_eq!(out, json!({"b": 2, "_id": 1}));
    }

    #[test]
    fn test_unknown_operator() {
        let mut d = map(json!({}));
        let err = apply_update(&mut d, &map(json!({"$rename": {"a": "b"}})), &Map::new());
        assert!(matches!(err, Err(StoreError::Unsupported(_))));
    }
}
