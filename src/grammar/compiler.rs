//! Clause compiler
//!
//! Turns clause lists into native filter documents, and sort, projection,
//! and update specs into their native forms. Pure and deterministic: the
//! same input always yields the same document, key order included.

use serde_json::{json, Map, Value as Json};

use crate::clause::{
    Clause, ClauseKind, Combinator, GeoPoint, ProjectionSpec, SortSpec, UpdateSpec, Value,
};
use crate::identifier::ObjectId;

use super::errors::{GrammarError, GrammarResult};
use super::pattern::like_to_regex;

/// Native filter document
pub type NativeFilter = Map<String, Json>;

/// Comparison operators accepted in `Comparison` clauses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    NotLike,
}

impl ComparisonOperator {
    /// Resolves a caller token (case-insensitive).
    ///
    /// Returns `None` for anything outside the table.
    pub fn parse(token: &str) -> Option<Self> {
        let normalized = token.trim().to_ascii_lowercase();
        let op = match normalized.split_whitespace().collect::<Vec<_>>().join(" ").as_str() {
            "=" | "==" | "eq" => ComparisonOperator::Eq,
            "!=" | "<>" | "ne" => ComparisonOperator::Ne,
            ">" | "gt" => ComparisonOperator::Gt,
            ">=" | "gte" => ComparisonOperator::Gte,
            "<" | "lt" => ComparisonOperator::Lt,
            "<=" | "lte" => ComparisonOperator::Lte,
            "like" => ComparisonOperator::Like,
            "not like" => ComparisonOperator::NotLike,
            _ => return None,
        };
        Some(op)
    }

    fn native(&self) -> Option<&'static str> {
        match self {
            ComparisonOperator::Ne => Some("$ne"),
            ComparisonOperator::Gt => Some("$gt"),
            ComparisonOperator::Gte => Some("$gte"),
            ComparisonOperator::Lt => Some("$lt"),
            ComparisonOperator::Lte => Some("$lte"),
            _ => None,
        }
    }
}

/// The clause compiler
#[derive(Debug, Clone)]
pub struct Grammar {
    primary_key: String,
}

impl Default for Grammar {
    fn default() -> Self {
        Self::new("_id")
    }
}

impl Grammar {
    /// Creates a grammar that treats `primary_key` as the identifier field
    pub fn new(primary_key: impl Into<String>) -> Self {
        Self {
            primary_key: primary_key.into(),
        }
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Compiles an ordered clause list into a native filter.
    ///
    /// Top-level clauses are split by combinator. A lone bucket with a
    /// single entry is emitted verbatim; a lone bucket with several entries
    /// is wrapped in `$and`/`$or`. When both buckets are populated the
    /// result is `{"$and": [<and-result>, {"$or": [...]}]}`.
    pub fn compile_filter(&self, clauses: &[Clause]) -> GrammarResult<NativeFilter> {
        let mut and_bucket = Vec::new();
        let mut or_bucket = Vec::new();

        for clause in clauses {
            let compiled = self.compile_clause(clause)?;
            match clause.combinator {
                Combinator::And => and_bucket.push(compiled),
                Combinator::Or => or_bucket.push(compiled),
            }
        }

        let filter = match (and_bucket.is_empty(), or_bucket.is_empty()) {
            (true, true) => Map::new(),
            (false, true) => Self::combine("$and", and_bucket),
            (true, false) => Self::combine("$or", or_bucket),
            (false, false) => {
                let and_result = Self::combine("$and", and_bucket);
                let or_wrapper = Self::wrap("$or", or_bucket);
                Self::wrap("$and", vec![and_result, or_wrapper])
            }
        };
        Ok(filter)
    }

    fn combine(operator: &str, mut items: Vec<NativeFilter>) -> NativeFilter {
        if items.len() == 1 {
            items.remove(0)
        } else {
            Self::wrap(operator, items)
        }
    }

    fn wrap(operator: &str, items: Vec<NativeFilter>) -> NativeFilter {
        let mut map = Map::new();
        map.insert(
            operator.to_string(),
            Json::Array(items.into_iter().map(Json::Object).collect()),
        );
        map
    }

    /// Compiles a single clause, ignoring its combinator
    pub fn compile_clause(&self, clause: &Clause) -> GrammarResult<NativeFilter> {
        let compiled = match &clause.kind {
            ClauseKind::Comparison {
                field,
                operator,
                value,
            } => self.compile_comparison(field, operator, value)?,
            ClauseKind::SetMembership {
                field,
                values,
                negate,
            } => {
                let op = if *negate { "$nin" } else { "$in" };
                let natives: Vec<Json> = values.iter().map(|v| self.operand(field, v)).collect();
                field_doc(field, json!({ op: natives }))
            }
            ClauseKind::Nullity { field, negate } => {
                if *negate {
                    field_doc(field, json!({ "$ne": null }))
                } else {
                    field_doc(field, Json::Null)
                }
            }
            ClauseKind::Range {
                field,
                low,
                high,
                negate,
            } => {
                let low = self.operand(field, low);
                let high = self.operand(field, high);
                if *negate {
                    Self::wrap(
                        "$or",
                        vec![
                            field_doc(field, json!({ "$lt": low })),
                            field_doc(field, json!({ "$gt": high })),
                        ],
                    )
                } else {
                    field_doc(field, json!({ "$gte": low, "$lte": high }))
                }
            }
            ClauseKind::Nested { clauses } => self.compile_filter(clauses)?,
            ClauseKind::Raw { fragment } => fragment.clone(),
            ClauseKind::PatternMatch {
                field,
                pattern,
                flags,
            } => field_doc(field, regex_doc(pattern, flags)),
            ClauseKind::Existence { field, expected } => {
                field_doc(field, json!({ "$exists": expected }))
            }
            ClauseKind::TypeCheck { field, type_tag } => {
                field_doc(field, json!({ "$type": type_tag.alias() }))
            }
            ClauseKind::ArraySize { field, size } => field_doc(field, json!({ "$size": size })),
            ClauseKind::ArrayContainsAll { field, values } => {
                let natives: Vec<Json> = values.iter().map(Value::to_native).collect();
                field_doc(field, json!({ "$all": natives }))
            }
            ClauseKind::ArrayElementMatch { field, clauses } => {
                let inner = self.compile_filter(clauses)?;
                field_doc(field, json!({ "$elemMatch": inner }))
            }
            ClauseKind::ProximitySearch {
                field,
                point,
                min_distance,
                max_distance,
            } => {
                let mut near = Map::new();
                near.insert("$geometry".into(), point_geometry(point));
                if let Some(min) = min_distance {
                    near.insert("$minDistance".into(), json!(min));
                }
                if let Some(max) = max_distance {
                    near.insert("$maxDistance".into(), json!(max));
                }
                field_doc(field, json!({ "$near": near }))
            }
            ClauseKind::RegionContainment { field, geometry } => {
                field_doc(field, json!({ "$geoWithin": { "$geometry": geometry } }))
            }
        };
        Ok(compiled)
    }

    fn compile_comparison(
        &self,
        field: &str,
        operator: &str,
        value: &Value,
    ) -> GrammarResult<NativeFilter> {
        let op = ComparisonOperator::parse(operator)
            .ok_or_else(|| GrammarError::unsupported_operator(field, operator))?;

        let compiled = match op {
            ComparisonOperator::Eq => field_doc(field, self.operand(field, value)),
            ComparisonOperator::Like | ComparisonOperator::NotLike => {
                let literal = value.as_str().ok_or_else(|| {
                    GrammarError::query_invalid(format!(
                        "LIKE on field '{}' requires a string pattern",
                        field
                    ))
                })?;
                let regex = regex_doc(&like_to_regex(literal), "i");
                if op == ComparisonOperator::NotLike {
                    field_doc(field, json!({ "$not": regex }))
                } else {
                    field_doc(field, regex)
                }
            }
            _ => {
                let native_op = op.native().unwrap_or("$eq");
                field_doc(field, json!({ native_op: self.operand(field, value) }))
            }
        };
        Ok(compiled)
    }

    /// Native form of an operand, with identifier coercion on the primary
    /// key field. Malformed identifier strings pass through unchanged.
    fn operand(&self, field: &str, value: &Value) -> Json {
        if field == self.primary_key {
            coerce_identifier(value).to_native()
        } else {
            value.to_native()
        }
    }

    /// Compiles sort keys into an ordered native sort document
    pub fn compile_sort(&self, sort: &[SortSpec]) -> NativeFilter {
        sort.iter()
            .map(|s| (s.field.clone(), json!(s.direction.native())))
            .collect()
    }

    /// Compiles a projection.
    ///
    /// A non-empty projection must be all-include or all-exclude. Excluding
    /// the primary key next to inclusions is the one mix the store accepts.
    pub fn compile_projection(&self, projection: &ProjectionSpec) -> GrammarResult<NativeFilter> {
        let first_include = projection
            .iter()
            .find(|(field, include)| *include && *field != self.primary_key)
            .map(|(field, _)| field);
        let first_exclude = projection
            .iter()
            .find(|(field, include)| !*include && *field != self.primary_key)
            .map(|(field, _)| field);

        if let (Some(included), Some(excluded)) = (first_include, first_exclude) {
            return Err(GrammarError::ambiguous_projection(included, excluded));
        }

        Ok(projection
            .iter()
            .map(|(field, include)| (field.to_string(), json!(i32::from(include))))
            .collect())
    }

    /// Compiles an update spec.
    ///
    /// Plain assignments are gathered under a single `$set` (only when there
    /// is at least one). Operator entries are copied untouched; if the
    /// caller also passed a `$set` operator, plain assignments are merged
    /// into it, which requires that `$set` to be a document.
    pub fn compile_update(&self, update: &UpdateSpec) -> GrammarResult<NativeFilter> {
        let assignments: Map<String, Json> = update
            .assignments()
            .map(|(field, value)| (field.to_string(), value.to_native()))
            .collect();

        let mut doc = Map::new();
        let has_set_operator = update.operators().any(|(op, _)| op == "$set");
        if !assignments.is_empty() && !has_set_operator {
            doc.insert("$set".into(), Json::Object(assignments.clone()));
        }

        for (op, value) in update.operators() {
            let mut native = value.to_native();
            if op == "$set" && !assignments.is_empty() {
                match &mut native {
                    Json::Object(existing) => existing.extend(assignments.clone()),
                    other => {
                        return Err(GrammarError::query_invalid(format!(
                            "$set must be a document to take plain assignments, got {}",
                            other
                        )))
                    }
                }
            }
            doc.insert(op.to_string(), native);
        }
        Ok(doc)
    }
}

/// Converts valid identifier strings (also inside arrays) to identifiers
pub fn coerce_identifier(value: &Value) -> Value {
    match value {
        Value::String(s) => match ObjectId::parse(s) {
            Ok(id) => Value::ObjectId(id),
            Err(_) => value.clone(),
        },
        Value::Array(items) => Value::Array(items.iter().map(coerce_identifier).collect()),
        other => other.clone(),
    }
}

fn field_doc(field: &str, value: Json) -> NativeFilter {
    let mut map = Map::new();
    map.insert(field.to_string(), value);
    map
}

fn regex_doc(pattern: &str, flags: &str) -> Json {
    let mut doc = Map::new();
    doc.insert("$regex".into(), json!(pattern));
    if !flags.is_empty() {
        doc.insert("$options".into(), json!(flags));
    }
    Json::Object(doc)
}

fn point_geometry(point: &GeoPoint) -> Json {
    json!({
        "type": "Point",
        "coordinates": [point.longitude, point.latitude],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause::TypeTag;
    use crate::grammar::GrammarErrorCode;
    use chrono::{TimeZone, Utc};

    const HEX: &str = "507f1f77bcf86cd799439011";

    fn compile(clauses: &[Clause]) -> Json {
        Json::Object(Grammar::default().compile_filter(clauses).unwrap())
    }

    #[test]
    fn test_empty_clause_list() {
        assert_eq!(compile(&[]), json!({}));
    }

    #[test]
    fn test_single_and_is_verbatim() {
        assert_eq!(compile(&[Clause::eq("name", "Alice")]), json!({"name": "Alice"}));
    }

    #[test]
    fn test_multiple_and_wrapped() {
        let out = compile(&[Clause::eq("a", 1), Clause::comparison("b", ">", 2)]);
        assert_eq!(out, json!({"$and": [{"a": 1}, {"b": {"$gt": 2}}]}));
    }

    #[test]
    fn test_single_or_is_verbatim() {
        assert_eq!(compile(&[Clause::eq("a", 1).or()]), json!({"a": 1}));
    }

    #[test]
    fn test_multiple_or_wrapped() {
        let out = compile(&[Clause::eq("a", 1).or(), Clause::eq("b", 2).or()]);
        assert_eq!(out, json!({"$or": [{"a": 1}, {"b": 2}]}));
    }

    #[test]
    fn test_mixed_buckets() {
        let out = compile(&[Clause::eq("a", 1), Clause::eq("b", 2), Clause::eq("c", 3).or()]);
        assert_eq!(
            out,
            json!({"$and": [
                {"$and": [{"a": 1}, {"b": 2}]},
                {"$or": [{"c": 3}]}
            ]})
        );
    }

    #[test]
    fn test_mixed_buckets_single_and() {
        let out = compile(&[Clause::eq("a", 1), Clause::eq("c", 3).or()]);
        assert_eq!(out, json!({"$and": [{"a": 1}, {"$or": [{"c": 3}]}]}));
    }

    #[test]
    fn test_operator_table() {
        let g = Grammar::default();
        for (token, native) in [
            ("!=", "$ne"),
            ("<>", "$ne"),
            (">", "$gt"),
            (">=", "$gte"),
            ("<", "$lt"),
            ("<=", "$lte"),
            ("GTE", "$gte"),
        ] {
            let out = g
                .compile_clause(&Clause::comparison("n", token, 5))
                .unwrap();
            assert_eq!(Json::Object(out), json!({"n": {native: 5}}), "token {}", token);
        }
    }

    #[test]
    fn test_unsupported_operator_rejects_whole_compile() {
        let err = Grammar::default()
            .compile_filter(&[Clause::eq("a", 1), Clause::comparison("b", "~=", 2)])
            .unwrap_err();
        assert_eq!(err.code(), GrammarErrorCode::AeroQueryUnsupportedOperator);
        assert_eq!(err.field(), Some("b"));
    }

    #[test]
    fn test_like_and_not_like() {
        let like = compile(&[Clause::comparison("name", "like", "J%n_")]);
        assert_eq!(like, json!({"name": {"$regex": "^J.*n.$", "$options": "i"}}));

        let not_like = compile(&[Clause::comparison("name", "not  LIKE", "J%")]);
        assert_eq!(
            not_like,
            json!({"name": {"$not": {"$regex": "^J.*$", "$options": "i"}}})
        );
    }

    #[test]
    fn test_like_requires_string() {
        let err = Grammar::default()
            .compile_filter(&[Clause::comparison("name", "like", 3)])
            .unwrap_err();
        assert_eq!(err.code(), GrammarErrorCode::AeroQueryInvalid);
    }

    #[test]
    fn test_identifier_coercion_on_primary_key() {
        let out = compile(&[Clause::eq("_id", HEX)]);
        assert_eq!(out, json!({"_id": {"$oid": HEX}}));

        let out = compile(&[Clause::in_set("_id", vec![Value::from(HEX), Value::from("bad")])]);
        assert_eq!(out, json!({"_id": {"$in": [{"$oid": HEX}, "bad"]}}));
    }

    #[test]
    fn test_identifier_coercion_only_on_primary_key() {
        let out = compile(&[Clause::eq("author_id", HEX)]);
        assert_eq!(out, json!({"author_id": HEX}));
    }

    #[test]
    fn test_custom_primary_key() {
        let g = Grammar::new("uid");
        let out = g.compile_filter(&[Clause::eq("uid", HEX)]).unwrap();
        assert_eq!(Json::Object(out), json!({"uid": {"$oid": HEX}}));
    }

    #[test]
    fn test_temporal_coercion() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let out = compile(&[Clause::comparison("created_at", ">=", dt)]);
        assert_eq!(
            out,
            json!({"created_at": {"$gte": {"$date": "2024-01-01T00:00:00.000Z"}}})
        );
    }

    #[test]
    fn test_nullity_and_range() {
        let out = compile(&[Clause::new(ClauseKind::Nullity {
            field: "deleted_at".into(),
            negate: false,
        })]);
        assert_eq!(out, json!({"deleted_at": null}));

        let out = compile(&[Clause::new(ClauseKind::Range {
            field: "age".into(),
            low: Value::from(18),
            high: Value::from(65),
            negate: true,
        })]);
        assert_eq!(
            out,
            json!({"$or": [{"age": {"$lt": 18}}, {"age": {"$gt": 65}}]})
        );
    }

    #[test]
    fn test_nested_keeps_grouping() {
        let out = compile(&[
            Clause::eq("status", "active"),
            Clause::nested(vec![Clause::eq("a", 1).or(), Clause::eq("b", 2).or()]),
        ]);
        assert_eq!(
            out,
            json!({"$and": [{"status": "active"}, {"$or": [{"a": 1}, {"b": 2}]}]})
        );
    }

    #[test]
    fn test_raw_passthrough() {
        let fragment = json!({"$where": "this.a > 1"}).as_object().cloned().unwrap();
        let out = compile(&[Clause::raw(fragment).or(), Clause::eq("b", 2).or()]);
        assert_eq!(out, json!({"$or": [{"$where": "this.a > 1"}, {"b": 2}]}));
    }

    #[test]
    fn test_document_operators() {
        let out = compile(&[
            Clause::new(ClauseKind::Existence {
                field: "email".into(),
                expected: true,
            }),
            Clause::new(ClauseKind::TypeCheck {
                field: "age".into(),
                type_tag: TypeTag::Int,
            }),
            Clause::new(ClauseKind::ArraySize {
                field: "tags".into(),
                size: 2,
            }),
            Clause::new(ClauseKind::ArrayContainsAll {
                field: "tags".into(),
                values: vec![Value::from("a"), Value::from("b")],
            }),
        ]);
        assert_eq!(
            out,
            json!({"$and": [
                {"email": {"$exists": true}},
                {"age": {"$type": "int"}},
                {"tags": {"$size": 2}},
                {"tags": {"$all": ["a", "b"]}}
            ]})
        );
    }

    #[test]
    fn test_elem_match() {
        let out = compile(&[Clause::new(ClauseKind::ArrayElementMatch {
            field: "items".into(),
            clauses: vec![Clause::eq("sku", "x"), Clause::comparison("qty", ">", 2)],
        })]);
        assert_eq!(
            out,
            json!({"items": {"$elemMatch": {"$and": [{"sku": "x"}, {"qty": {"$gt": 2}}]}}})
        );
    }

    #[test]
    fn test_geo_clauses() {
        let out = compile(&[Clause::new(ClauseKind::ProximitySearch {
            field: "location".into(),
            point: GeoPoint::new(10.75, 59.91),
            min_distance: None,
            max_distance: Some(500.0),
        })]);
        assert_eq!(
            out,
            json!({"location": {"$near": {
                "$geometry": {"type": "Point", "coordinates": [10.75, 59.91]},
                "$maxDistance": 500.0
            }}})
        );

        let polygon = json!({"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]]});
        let out = compile(&[Clause::new(ClauseKind::RegionContainment {
            field: "location".into(),
            geometry: polygon.clone(),
        })]);
        assert_eq!(out, json!({"location": {"$geoWithin": {"$geometry": polygon}}}));
    }

    #[test]
    fn test_pattern_match_flags() {
        let out = compile(&[Clause::new(ClauseKind::PatternMatch {
            field: "name".into(),
            pattern: "^al".into(),
            flags: String::new(),
        })]);
        assert_eq!(out, json!({"name": {"$regex": "^al"}}));
    }

    #[test]
    fn test_compile_sort_keeps_order() {
        let sort = Grammar::default().compile_sort(&[SortSpec::desc("b"), SortSpec::asc("a")]);
        let keys: Vec<_> = sort.keys().cloned().collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(Json::Object(sort), json!({"b": -1, "a": 1}));
    }

    #[test]
    fn test_projection_homogeneity() {
        let g = Grammar::default();
        let ok = g
            .compile_projection(&ProjectionSpec::new().include("a").include("b"))
            .unwrap();
        assert_eq!(Json::Object(ok), json!({"a": 1, "b": 1}));

        let ok = g
            .compile_projection(&ProjectionSpec::new().include("a").exclude("_id"))
            .unwrap();
        assert_eq!(Json::Object(ok), json!({"a": 1, "_id": 0}));

        let err = g
            .compile_projection(&ProjectionSpec::new().include("a").exclude("b"))
            .unwrap_err();
        assert_eq!(err.code(), GrammarErrorCode::AeroQueryAmbiguousProjection);
    }

    #[test]
    fn test_compile_update() {
        let g = Grammar::default();
        let update = UpdateSpec::new()
            .set("name", "Bob")
            .operator("$inc", json!({"visits": 1}));
        assert_eq!(
            Json::Object(g.compile_update(&update).unwrap()),
            json!({"$set": {"name": "Bob"}, "$inc": {"visits": 1}})
        );

        let only_ops = UpdateSpec::new().operator("$unset", json!({"tmp": ""}));
        assert_eq!(
            Json::Object(g.compile_update(&only_ops).unwrap()),
            json!({"$unset": {"tmp": ""}})
        );

        let merged = UpdateSpec::new()
            .operator("$set", json!({"a": 1}))
            .set("b", 2);
        assert_eq!(
            Json::Object(g.compile_update(&merged).unwrap()),
            json!({"$set": {"a": 1, "b": 2}})
        );
    }

    #[test]
    fn test_non_document_set_rejected_with_assignments() {
        let g = Grammar::default();
        let update = UpdateSpec::new().operator("$set", json!(null)).set("name", "Bob");
        let err = g.compile_update(&update).unwrap_err();
        assert_eq!(err.code(), GrammarErrorCode::AeroQueryInvalid);

        let scalar = UpdateSpec::new().set("name", "Bob").operator("$set", json!(5));
        assert!(g.compile_update(&scalar).is_err());

        // Without plain assignments the operator passes through untouched
        let passthrough = UpdateSpec::new().operator("$set", json!(null));
        assert_eq!(
            Json::Object(g.compile_update(&passthrough).unwrap()),
            json!({"$set": null})
        );
    }
}
