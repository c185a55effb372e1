//! In-memory reference connection
//!
//! Evaluates native documents produced by the grammar against collections
//! held in process memory. Every call is recorded so callers can assert on
//! round-trip counts and the exact filters that reached the store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

use serde_json::{Map, Value};

use crate::identifier::ObjectId;

use super::connection::{Connection, DeleteResult, Document, InsertResult, UpdateResult};
use super::errors::{StoreError, StoreResult};
use super::matcher::{is_operator_doc, resolve_path, NativeMatcher};
use super::options::{FindOptions, UpdateOptions};
use super::sorter::{compare_values, DocumentSorter};
use super::update::apply_update;

const ID_FIELD: &str = "_id";

/// A recorded store round trip
#[derive(Debug, Clone, PartialEq)]
pub struct StoreCall {
    pub operation: &'static str,
    pub collection: String,
    /// Filter for reads, updates and deletes; the pipeline's `$match` for
    /// aggregates; empty for inserts
    pub filter: Document,
}

/// Collections kept in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
    call_count: AtomicUsize,
    calls: Mutex<Vec<StoreCall>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with one collection pre-populated
    pub fn with_documents(collection: &str, documents: Vec<Value>) -> StoreResult<Self> {
        let store = Self::new();
        store.seed(collection, documents)?;
        Ok(store)
    }

    /// Appends documents without recording a call.
    ///
    /// Documents are stored as given; no identifier is generated.
    pub fn seed(&self, collection: &str, documents: Vec<Value>) -> StoreResult<()> {
        let mut collections = self.write()?;
        let target = collections.entry(collection.to_string()).or_default();
        for document in documents {
            match document {
                Value::Object(map) => target.push(map),
                other => {
                    return Err(StoreError::InvalidDocument(format!(
                        "expected a document, got {}",
                        other
                    )))
                }
            }
        }
        Ok(())
    }

    /// Number of calls since creation or the last reset
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Calls recorded since creation or the last reset
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn reset_calls(&self) {
        self.call_count.store(0, Ordering::SeqCst);
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }

    /// Snapshot of a collection in insertion order
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.collections
            .read()
            .ok()
            .and_then(|c| c.get(collection).cloned())
            .unwrap_or_default()
    }

    fn record(&self, operation: &'static str, collection: &str, filter: &Document) {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(StoreCall {
                operation,
                collection: collection.to_string(),
                filter: filter.clone(),
            });
        }
    }

    fn read(
        &self,
    ) -> StoreResult<std::sync::RwLockReadGuard<'_, HashMap<String, Vec<Document>>>> {
        self.collections
            .read()
            .map_err(|_| StoreError::Internal("collection lock poisoned".into()))
    }

    fn write(
        &self,
    ) -> StoreResult<std::sync::RwLockWriteGuard<'_, HashMap<String, Vec<Document>>>> {
        self.collections
            .write()
            .map_err(|_| StoreError::Internal("collection lock poisoned".into()))
    }

    fn matching(&self, collection: &str, filter: &Document) -> StoreResult<Vec<Document>> {
        let collections = self.read()?;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|d| NativeMatcher::matches(d, filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn insert_into(target: &mut Vec<Document>, mut document: Document) -> StoreResult<Value> {
        let id = document
            .entry(ID_FIELD)
            .or_insert_with(|| ObjectId::new().to_native())
            .clone();
        if target.iter().any(|d| d.get(ID_FIELD) == Some(&id)) {
            return Err(StoreError::DuplicateKey(id.to_string()));
        }
        target.push(document);
        Ok(id)
    }

    fn update(
        &self,
        operation: &'static str,
        collection: &str,
        filter: &Document,
        update: &Document,
        options: &UpdateOptions,
        multi: bool,
    ) -> StoreResult<UpdateResult> {
        self.record(operation, collection, filter);
        let mut collections = self.write()?;
        let target = collections.entry(collection.to_string()).or_default();

        let mut result = UpdateResult::default();
        for document in target.iter_mut() {
            if !NativeMatcher::matches(document, filter) {
                continue;
            }
            result.matched_count += 1;
            if apply_update(document, update, filter)? {
                result.modified_count += 1;
            }
            if !multi {
                break;
            }
        }

        if result.matched_count == 0 && options.upsert {
            let mut seed = upsert_seed(filter);
            apply_update(&mut seed, update, filter)?;
            result.upserted_id = Some(Self::insert_into(target, seed)?);
        }
        Ok(result)
    }
}

impl Connection for MemoryStore {
    fn find(
        &self,
        collection: &str,
        filter: &Document,
        options: &FindOptions,
    ) -> StoreResult<Vec<Document>> {
        self.record("find", collection, filter);
        let mut documents = self.matching(collection, filter)?;

        if let Some(sort) = &options.sort {
            DocumentSorter::sort(&mut documents, sort);
        }
        let skip = options.skip.unwrap_or(0) as usize;
        let limit = options.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        let documents = documents.into_iter().skip(skip).take(limit);

        Ok(match &options.projection {
            Some(projection) if !projection.is_empty() => {
                documents.map(|d| project(&d, projection)).collect()
            }
            _ => documents.collect(),
        })
    }

    fn count_documents(
        &self,
        collection: &str,
        filter: &Document,
        options: &FindOptions,
    ) -> StoreResult<u64> {
        self.record("count", collection, filter);
        let total = self.matching(collection, filter)?.len() as u64;
        let total = total.saturating_sub(options.skip.unwrap_or(0));
        Ok(options.limit.map(|l| total.min(l)).unwrap_or(total))
    }

    fn aggregate(
        &self,
        collection: &str,
        pipeline: &[Value],
        _options: &FindOptions,
    ) -> StoreResult<Vec<Document>> {
        let first_match = pipeline
            .first()
            .and_then(|stage| stage.get("$match"))
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        self.record("aggregate", collection, &first_match);

        let mut documents = self
            .read()?
            .get(collection)
            .cloned()
            .unwrap_or_default();

        for stage in pipeline {
            let (name, arg) = stage
                .as_object()
                .and_then(|s| s.iter().next())
                .ok_or_else(|| StoreError::InvalidDocument("empty pipeline stage".into()))?;
            documents = match name.as_str() {
                "$match" => {
                    let filter = arg.as_object().cloned().unwrap_or_default();
                    documents
                        .into_iter()
                        .filter(|d| NativeMatcher::matches(d, &filter))
                        .collect()
                }
                "$group" => group(documents, arg)?,
                "$sort" => {
                    let sort = arg.as_object().cloned().unwrap_or_default();
                    DocumentSorter::sort(&mut documents, &sort);
                    documents
                }
                "$skip" => {
                    let n = arg.as_u64().unwrap_or(0) as usize;
                    documents.into_iter().skip(n).collect()
                }
                "$limit" => {
                    let n = arg.as_u64().unwrap_or(u64::MAX) as usize;
                    documents.into_iter().take(n).collect()
                }
                other => {
                    return Err(StoreError::Unsupported(format!("pipeline stage {}", other)))
                }
            };
        }
        Ok(documents)
    }

    fn insert_one(&self, collection: &str, document: Document) -> StoreResult<InsertResult> {
        self.record("insert_one", collection, &Document::new());
        let mut collections = self.write()?;
        let target = collections.entry(collection.to_string()).or_default();
        let id = Self::insert_into(target, document)?;
        Ok(InsertResult {
            inserted_ids: vec![id],
        })
    }

    fn insert_many(&self, collection: &str, documents: Vec<Document>) -> StoreResult<InsertResult> {
        self.record("insert_many", collection, &Document::new());
        let mut collections = self.write()?;
        let target = collections.entry(collection.to_string()).or_default();
        let mut inserted_ids = Vec::with_capacity(documents.len());
        for document in documents {
            inserted_ids.push(Self::insert_into(target, document)?);
        }
        Ok(InsertResult { inserted_ids })
    }

    fn update_one(
        &self,
        collection: &str,
        filter: &Document,
        update: &Document,
        options: &UpdateOptions,
    ) -> StoreResult<UpdateResult> {
        self.update("update_one", collection, filter, update, options, false)
    }

    fn update_many(
        &self,
        collection: &str,
        filter: &Document,
        update: &Document,
        options: &UpdateOptions,
    ) -> StoreResult<UpdateResult> {
        self.update("update_many", collection, filter, update, options, true)
    }

    fn delete_one(&self, collection: &str, filter: &Document) -> StoreResult<DeleteResult> {
        self.record("delete_one", collection, filter);
        let mut collections = self.write()?;
        let Some(target) = collections.get_mut(collection) else {
            return Ok(DeleteResult::default());
        };
        match target.iter().position(|d| NativeMatcher::matches(d, filter)) {
            Some(index) => {
                target.remove(index);
                Ok(DeleteResult { deleted_count: 1 })
            }
            None => Ok(DeleteResult::default()),
        }
    }

    fn delete_many(&self, collection: &str, filter: &Document) -> StoreResult<DeleteResult> {
        self.record("delete_many", collection, filter);
        let mut collections = self.write()?;
        let Some(target) = collections.get_mut(collection) else {
            return Ok(DeleteResult::default());
        };
        let before = target.len();
        target.retain(|d| !NativeMatcher::matches(d, filter));
        Ok(DeleteResult {
            deleted_count: (before - target.len()) as u64,
        })
    }
}

/// Literal equality conditions of a filter, used as the base of an upsert
fn upsert_seed(filter: &Document) -> Document {
    let mut seed = Document::new();
    for (key, condition) in filter {
        if key == "$and" {
            for sub in condition.as_array().into_iter().flatten() {
                if let Value::Object(sub) = sub {
                    seed.extend(upsert_seed(sub));
                }
            }
        } else if !key.starts_with('$') && !key.contains('.') && !is_operator_doc(condition) {
            seed.insert(key.clone(), condition.clone());
        }
    }
    seed
}

/// Applies an inclusion or exclusion projection to top-level fields
fn project(document: &Document, projection: &Map<String, Value>) -> Document {
    let flag = |v: &Value| v.as_bool().unwrap_or_else(|| v.as_i64().unwrap_or(1) != 0);
    let inclusive = projection
        .iter()
        .any(|(field, v)| field != ID_FIELD && flag(v));

    if inclusive {
        let mut out = Document::new();
        if projection.get(ID_FIELD).map(flag).unwrap_or(true) {
            if let Some(id) = document.get(ID_FIELD) {
                out.insert(ID_FIELD.into(), id.clone());
            }
        }
        for (field, v) in projection {
            if field != ID_FIELD && flag(v) {
                if let Some(value) = document.get(field) {
                    out.insert(field.clone(), value.clone());
                }
            }
        }
        out
    } else {
        let mut out = document.clone();
        for field in projection.keys() {
            out.remove(field);
        }
        out
    }
}

/// `$group` with `$sum`, `$avg`, `$min` and `$max` accumulators
fn group(documents: Vec<Document>, spec: &Value) -> StoreResult<Vec<Document>> {
    let spec = spec
        .as_object()
        .ok_or_else(|| StoreError::InvalidDocument("$group expects a document".into()))?;
    let key_expr = spec.get(ID_FIELD).cloned().unwrap_or(Value::Null);

    let mut order: Vec<Value> = Vec::new();
    let mut buckets: Vec<Vec<Document>> = Vec::new();
    for document in documents {
        let key = evaluate(&document, &key_expr);
        match order.iter().position(|k| *k == key) {
            Some(index) => buckets[index].push(document),
            None => {
                order.push(key);
                buckets.push(vec![document]);
            }
        }
    }

    let mut out = Vec::with_capacity(order.len());
    for (key, members) in order.into_iter().zip(buckets) {
        let mut row = Document::new();
        row.insert(ID_FIELD.into(), key);
        for (name, accumulator) in spec.iter().filter(|(k, _)| k.as_str() != ID_FIELD) {
            let (op, expr) = accumulator
                .as_object()
                .and_then(|a| a.iter().next())
                .ok_or_else(|| StoreError::InvalidDocument(format!("bad accumulator {}", name)))?;
            let values: Vec<Value> = members
                .iter()
                .map(|d| evaluate(d, expr))
                .filter(|v| !v.is_null())
                .collect();
            row.insert(name.clone(), accumulate(op, &values)?);
        }
        out.push(row);
    }
    Ok(out)
}

/// Evaluates `"$field"` references, also inside documents; anything else
/// is a literal
fn evaluate(document: &Document, expr: &Value) -> Value {
    match expr {
        Value::String(s) if s.starts_with('$') => resolve_path(document, &s[1..])
            .into_iter()
            .next()
            .cloned()
            .unwrap_or(Value::Null),
        Value::Object(map) if !map.keys().any(|k| k.starts_with('$')) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), evaluate(document, v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn accumulate(op: &str, values: &[Value]) -> StoreResult<Value> {
    let numbers = || values.iter().filter_map(Value::as_f64);
    let all_int = values.iter().all(|v| v.is_i64());
    Ok(match op {
        "$sum" if all_int => Value::from(values.iter().filter_map(Value::as_i64).sum::<i64>()),
        "$sum" => Value::from(numbers().sum::<f64>()),
        "$avg" => {
            let count = numbers().count();
            if count == 0 {
                Value::Null
            } else {
                Value::from(numbers().sum::<f64>() / count as f64)
            }
        }
        "$min" => values
            .iter()
            .min_by(|a, b| compare_values(a, b))
            .cloned()
            .unwrap_or(Value::Null),
        "$max" => values
            .iter()
            .max_by(|a, b| compare_values(a, b))
            .cloned()
            .unwrap_or(Value::Null),
        other => return Err(StoreError::Unsupported(format!("accumulator {}", other))),
    })
}
