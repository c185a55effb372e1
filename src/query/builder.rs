//! Fluent query builder
//!
//! Accumulates clauses, sort keys, a projection, and paging, and compiles
//! them on demand. Nothing is cached: every compile re-runs the grammar over
//! the current state. Terminal operations take the connection explicitly.

use std::sync::Arc;

use serde_json::{json, Map, Value as Json};

use crate::clause::{
    Clause, ClauseKind, GeoPoint, ProjectionSpec, SortDirection, SortSpec, TypeTag, UpdateSpec,
    Value,
};
use crate::config::AccessConfig;
use crate::error::{Error, Result};
use crate::grammar::{GrammarError, GrammarResult, NativeFilter};
use crate::model::{ModelSchema, Record};
use crate::observability::{log_event_with_fields, Event, Logger};
use crate::relations::{load_relations, EagerLoad};
use crate::store::{Connection, Document, FindOptions, UpdateOptions, UpdateResult};

use super::aggregate::{build_pipeline, AggregateFunction, AggregateStages, AGGREGATE_FIELD};
use super::pagination::{keyset_clause, page_offset, Cursor, CursorPage, Page};

/// A query against one model's collection
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    schema: Arc<ModelSchema>,
    clauses: Vec<Clause>,
    sort: Vec<SortSpec>,
    projection: ProjectionSpec,
    limit: Option<u64>,
    skip: Option<u64>,
    group_by: Vec<String>,
    eager: Vec<EagerLoad>,
    max_time_ms: Option<u64>,
    hint: Option<Json>,
    default_per_page: u64,
    max_per_page: u64,
}

impl QueryBuilder {
    pub fn new(schema: Arc<ModelSchema>) -> Self {
        let config = AccessConfig::default();
        Self {
            schema,
            clauses: Vec::new(),
            sort: Vec::new(),
            projection: ProjectionSpec::new(),
            limit: None,
            skip: None,
            group_by: Vec::new(),
            eager: Vec::new(),
            max_time_ms: None,
            hint: None,
            default_per_page: config.default_per_page,
            max_per_page: config.max_per_page,
        }
    }

    /// A query over a bare collection, without declared relations
    pub fn for_collection(collection: impl Into<String>) -> Self {
        Self::new(ModelSchema::new(collection).build())
    }

    /// Takes page-size bounds and the execution limit from configuration.
    /// An explicitly set `max_time_ms` wins.
    pub fn apply_config(mut self, config: &AccessConfig) -> Self {
        self.default_per_page = config.default_per_page;
        self.max_per_page = config.max_per_page;
        if self.max_time_ms.is_none() {
            self.max_time_ms = config.max_time_ms;
        }
        self
    }

    pub fn schema(&self) -> &Arc<ModelSchema> {
        &self.schema
    }

    pub fn collection(&self) -> &str {
        self.schema.collection()
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn orders(&self) -> &[SortSpec] {
        &self.sort
    }

    pub fn limit_value(&self) -> Option<u64> {
        self.limit
    }

    pub fn skip_value(&self) -> Option<u64> {
        self.skip
    }

    pub fn eager_loads(&self) -> &[EagerLoad] {
        &self.eager
    }

    // ==================== Predicates ====================

    /// Appends a prepared clause
    pub fn where_clause(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    /// Appends several prepared clauses in order
    pub fn where_clauses(mut self, clauses: impl IntoIterator<Item = Clause>) -> Self {
        self.clauses.extend(clauses);
        self
    }

    /// `field <operator> value`; the operator is checked at compile time
    pub fn where_op(
        self,
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.where_clause(Clause::comparison(field, operator, value))
    }

    pub fn or_where_op(
        self,
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.where_clause(Clause::comparison(field, operator, value).or())
    }

    pub fn where_eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.where_clause(Clause::eq(field, value))
    }

    pub fn or_where_eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.where_clause(Clause::eq(field, value).or())
    }

    pub fn where_ne(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.where_op(field, "!=", value)
    }

    /// Primary key equality
    pub fn where_key(self, key: impl Into<Value>) -> Self {
        let primary_key = self.schema.primary_key().to_string();
        self.where_eq(primary_key, key)
    }

    pub fn where_in<V: Into<Value>>(
        self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.where_clause(membership(field, values, false))
    }

    pub fn or_where_in<V: Into<Value>>(
        self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.where_clause(membership(field, values, false).or())
    }

    pub fn where_not_in<V: Into<Value>>(
        self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.where_clause(membership(field, values, true))
    }

    pub fn where_null(self, field: impl Into<String>) -> Self {
        self.where_clause(nullity(field, false))
    }

    pub fn or_where_null(self, field: impl Into<String>) -> Self {
        self.where_clause(nullity(field, false).or())
    }

    pub fn where_not_null(self, field: impl Into<String>) -> Self {
        self.where_clause(nullity(field, true))
    }

    pub fn or_where_not_null(self, field: impl Into<String>) -> Self {
        self.where_clause(nullity(field, true).or())
    }

    /// Inclusive range
    pub fn where_between(
        self,
        field: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.where_clause(range(field, low, high, false))
    }

    pub fn where_not_between(
        self,
        field: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.where_clause(range(field, low, high, true))
    }

    /// Groups the clauses added by `build` so they combine as one unit
    pub fn where_nested(self, build: impl FnOnce(QueryBuilder) -> QueryBuilder) -> Self {
        let inner = build(self.fresh()).clauses;
        self.where_clause(Clause::nested(inner))
    }

    pub fn or_where_nested(self, build: impl FnOnce(QueryBuilder) -> QueryBuilder) -> Self {
        let inner = build(self.fresh()).clauses;
        self.where_clause(Clause::nested(inner).or())
    }

    /// Native filter fragment, inserted verbatim
    pub fn where_raw(self, fragment: Map<String, Json>) -> Self {
        self.where_clause(Clause::raw(fragment))
    }

    pub fn or_where_raw(self, fragment: Map<String, Json>) -> Self {
        self.where_clause(Clause::raw(fragment).or())
    }

    /// SQL-style pattern: `%` matches any run, `_` one character
    pub fn where_like(self, field: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.where_op(field, "like", pattern.into())
    }

    pub fn where_not_like(self, field: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.where_op(field, "not like", pattern.into())
    }

    /// Regular expression in store syntax
    pub fn where_regex(
        self,
        field: impl Into<String>,
        pattern: impl Into<String>,
        flags: impl Into<String>,
    ) -> Self {
        self.where_clause(Clause::new(ClauseKind::PatternMatch {
            field: field.into(),
            pattern: pattern.into(),
            flags: flags.into(),
        }))
    }

    pub fn where_exists(self, field: impl Into<String>, expected: bool) -> Self {
        self.where_clause(Clause::new(ClauseKind::Existence {
            field: field.into(),
            expected,
        }))
    }

    pub fn where_type(self, field: impl Into<String>, type_tag: TypeTag) -> Self {
        self.where_clause(Clause::new(ClauseKind::TypeCheck {
            field: field.into(),
            type_tag,
        }))
    }

    pub fn where_size(self, field: impl Into<String>, size: u64) -> Self {
        self.where_clause(Clause::new(ClauseKind::ArraySize {
            field: field.into(),
            size,
        }))
    }

    pub fn where_all<V: Into<Value>>(
        self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.where_clause(Clause::new(ClauseKind::ArrayContainsAll {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }))
    }

    /// Some array element satisfies every clause added by `build`
    pub fn where_elem_match(
        self,
        field: impl Into<String>,
        build: impl FnOnce(QueryBuilder) -> QueryBuilder,
    ) -> Self {
        let clauses = build(self.fresh()).clauses;
        self.where_clause(Clause::new(ClauseKind::ArrayElementMatch {
            field: field.into(),
            clauses,
        }))
    }

    /// Proximity to a point; distances in meters
    pub fn where_near(
        self,
        field: impl Into<String>,
        point: GeoPoint,
        min_distance: Option<f64>,
        max_distance: Option<f64>,
    ) -> Self {
        self.where_clause(Clause::new(ClauseKind::ProximitySearch {
            field: field.into(),
            point,
            min_distance,
            max_distance,
        }))
    }

    /// Containment in a GeoJSON geometry
    pub fn where_within(self, field: impl Into<String>, geometry: Json) -> Self {
        self.where_clause(Clause::new(ClauseKind::RegionContainment {
            field: field.into(),
            geometry,
        }))
    }

    // ==================== Shape ====================

    /// Adds an ascending sort key. Re-ordering a field replaces its entry.
    pub fn order_by(self, field: impl Into<String>) -> Self {
        self.order_by_direction(field, SortDirection::Asc)
    }

    pub fn order_by_desc(self, field: impl Into<String>) -> Self {
        self.order_by_direction(field, SortDirection::Desc)
    }

    pub fn order_by_direction(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        let field = field.into();
        match self.sort.iter_mut().find(|s| s.field == field) {
            Some(existing) => existing.direction = direction,
            None => self.sort.push(SortSpec { field, direction }),
        }
        self
    }

    /// Newest first by `field`
    pub fn latest(self, field: impl Into<String>) -> Self {
        self.order_by_desc(field)
    }

    /// Oldest first by `field`
    pub fn oldest(self, field: impl Into<String>) -> Self {
        self.order_by(field)
    }

    pub fn select<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        for field in fields {
            self.projection.mark(field.into(), true);
        }
        self
    }

    pub fn exclude<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        for field in fields {
            self.projection.mark(field.into(), false);
        }
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn offset(self, offset: u64) -> Self {
        self.skip(offset)
    }

    /// Pages are 1-based; zero or negative pages clamp to the first
    pub fn for_page(self, page: i64, per_page: u64) -> Self {
        self.skip(page_offset(page, per_page)).limit(per_page)
    }

    /// Groups aggregate results by these fields
    pub fn group_by<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.group_by.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Eager-loads a relation path such as `"author"` or `"tags.owner"`
    pub fn with(mut self, path: impl Into<String>) -> Self {
        self.eager.push(EagerLoad::new(path));
        self
    }

    /// Eager-loads a relation path with extra constraints on its lookup
    pub fn with_constrained<F>(mut self, path: impl Into<String>, constraint: F) -> Self
    where
        F: Fn(QueryBuilder) -> QueryBuilder + Send + Sync + 'static,
    {
        self.eager.push(EagerLoad::constrained(path, constraint));
        self
    }

    pub fn max_time_ms(mut self, ms: u64) -> Self {
        self.max_time_ms = Some(ms);
        self
    }

    /// Index hint, passed to the store untouched
    pub fn hint(mut self, hint: Json) -> Self {
        self.hint = Some(hint);
        self
    }

    /// Same model and settings, no clauses or shape
    fn fresh(&self) -> QueryBuilder {
        let mut fresh = QueryBuilder::new(Arc::clone(&self.schema));
        fresh.default_per_page = self.default_per_page;
        fresh.max_per_page = self.max_per_page;
        fresh
    }

    // ==================== Compilation ====================

    /// Compiles the current state into a native filter and find options
    pub fn compile_read(&self) -> GrammarResult<(NativeFilter, FindOptions)> {
        let grammar = self.schema.grammar();
        let filter = grammar.compile_filter(&self.clauses)?;

        let projection = if self.projection.is_empty() {
            None
        } else {
            Some(grammar.compile_projection(&self.projection)?)
        };
        let sort = if self.sort.is_empty() {
            None
        } else {
            Some(grammar.compile_sort(&self.sort))
        };

        let options = FindOptions {
            sort,
            projection,
            skip: self.skip,
            limit: self.limit,
            max_time_ms: self.max_time_ms,
            hint: self.hint.clone(),
        };
        Ok((filter, options))
    }

    /// Compiles the current state plus an update spec.
    ///
    /// An update that compiles to an empty document is rejected; the store
    /// would read it as a whole-document replacement.
    pub fn compile_write(
        &self,
        update: &UpdateSpec,
    ) -> GrammarResult<(NativeFilter, NativeFilter, FindOptions)> {
        let (filter, options) = self.compile_read()?;
        let native_update = self.schema.grammar().compile_update(update)?;
        if native_update.is_empty() {
            return Err(GrammarError::query_invalid("update document is empty"));
        }
        Ok((filter, native_update, options))
    }

    fn read_plan(&self) -> Result<(NativeFilter, FindOptions)> {
        self.compile_read().map_err(|e| self.rejected(e))
    }

    fn write_plan(&self, update: &UpdateSpec) -> Result<(NativeFilter, NativeFilter)> {
        let (filter, update, _) = self.compile_write(update).map_err(|e| self.rejected(e))?;
        Ok((filter, update))
    }

    fn rejected(&self, error: GrammarError) -> Error {
        log_event_with_fields(
            Event::QueryRejected,
            &[
                ("code", error.code().code()),
                ("collection", self.collection()),
                ("message", error.message()),
            ],
        );
        Error::Grammar(error)
    }

    fn trace(&self, event: Event, filter: &NativeFilter) {
        if !Logger::records(event.severity()) {
            return;
        }
        log_event_with_fields(
            event,
            &[
                ("collection", self.collection()),
                ("filter", &Json::Object(filter.clone()).to_string()),
            ],
        );
    }

    // ==================== Reads ====================

    /// Runs the query and hydrates every document, then eager-loads
    pub fn get(&self, conn: &dyn Connection) -> Result<Vec<Record>> {
        let (filter, options) = self.read_plan()?;
        self.trace(Event::QueryFind, &filter);

        let documents = conn.find(self.collection(), &filter, &options)?;
        let mut records: Vec<Record> = documents
            .into_iter()
            .map(|document| self.schema.hydrate(document))
            .collect();

        if !self.eager.is_empty() && !records.is_empty() {
            load_relations(conn, &mut records, &self.eager)?;
        }
        Ok(records)
    }

    pub fn first(&self, conn: &dyn Connection) -> Result<Option<Record>> {
        Ok(self.clone().limit(1).get(conn)?.into_iter().next())
    }

    /// Looks up one record by primary key
    pub fn find(&self, conn: &dyn Connection, key: impl Into<Value>) -> Result<Option<Record>> {
        self.clone().where_key(key).first(conn)
    }

    pub fn find_or_fail(&self, conn: &dyn Connection, key: impl Into<Value>) -> Result<Record> {
        let key = key.into();
        self.find(conn, key.clone())?.ok_or_else(|| Error::NotFound {
            collection: self.collection().to_string(),
            key: key.to_native().to_string(),
        })
    }

    /// Looks up records by primary key. No keys means no store call.
    pub fn find_many<V: Into<Value>>(
        &self,
        conn: &dyn Connection,
        keys: impl IntoIterator<Item = V>,
    ) -> Result<Vec<Record>> {
        let keys: Vec<Value> = keys.into_iter().map(Into::into).collect();
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let primary_key = self.schema.primary_key().to_string();
        self.clone().where_in(primary_key, keys).get(conn)
    }

    /// Number of matching documents, honoring skip and limit
    pub fn count(&self, conn: &dyn Connection) -> Result<u64> {
        let (filter, options) = self.read_plan()?;
        self.trace(Event::QueryCount, &filter);
        let options = FindOptions {
            sort: None,
            projection: None,
            ..options
        };
        Ok(conn.count_documents(self.collection(), &filter, &options)?)
    }

    pub fn exists(&self, conn: &dyn Connection) -> Result<bool> {
        Ok(self.clone().limit(1).count(conn)? > 0)
    }

    /// Values of one field across the matching documents; documents without
    /// the field are skipped
    pub fn pluck(&self, conn: &dyn Connection, field: &str) -> Result<Vec<Json>> {
        let mut query = self.clone().select([field]);
        query.eager.clear();
        Ok(query
            .get(conn)?
            .iter()
            .filter_map(|record| record.attribute(field).cloned())
            .collect())
    }

    /// Length-aware page. `per_page` falls back to the configured default
    /// and is capped by the configured maximum.
    pub fn paginate(
        &self,
        conn: &dyn Connection,
        per_page: Option<u64>,
        page: i64,
    ) -> Result<Page<Record>> {
        let per_page = self.per_page(per_page);

        let mut counting = self.clone();
        counting.skip = None;
        counting.limit = None;
        let total = counting.count(conn)?;

        let items = if total == 0 {
            Vec::new()
        } else {
            self.clone().for_page(page, per_page).get(conn)?
        };
        Ok(Page::new(items, total, per_page, page))
    }

    /// Keyset page after (or before) `cursor`.
    ///
    /// Without explicit ordering the primary key ascending is used; the
    /// primary key is always appended as the final tie-breaker.
    pub fn cursor_paginate(
        &self,
        conn: &dyn Connection,
        per_page: Option<u64>,
        cursor: Option<&Cursor>,
    ) -> Result<CursorPage<Record>> {
        let per_page = self.per_page(per_page);
        let primary_key = self.schema.primary_key().to_string();

        let mut orders = self.sort.clone();
        if !orders.iter().any(|o| o.field == primary_key) {
            orders.push(SortSpec::asc(primary_key));
        }

        let mut query = self.clone();
        query.skip = None;
        query.sort = orders.clone();
        if let Some(cursor) = cursor {
            query = query.where_clause(keyset_clause(&orders, cursor)?);
            if cursor.points_to_previous_items() {
                query.sort = orders.iter().map(SortSpec::reversed).collect();
            }
        }

        let items = query.limit(per_page + 1).get(conn)?;
        Ok(CursorPage::from_overfetch(
            items,
            per_page,
            &orders,
            cursor,
            |record, field| record.attribute(field).cloned(),
        ))
    }

    fn per_page(&self, requested: Option<u64>) -> u64 {
        requested
            .filter(|n| *n > 0)
            .unwrap_or(self.default_per_page)
            .min(self.max_per_page)
    }

    // ==================== Aggregation ====================

    /// Runs `function` over `field`. Without grouping this is the single
    /// aggregate value (0 for an empty count, null otherwise).
    pub fn aggregate_value(
        &self,
        conn: &dyn Connection,
        function: AggregateFunction,
        field: Option<&str>,
    ) -> Result<Json> {
        let rows = self.aggregate_rows(conn, function, field)?;
        let value = rows
            .into_iter()
            .next()
            .and_then(|mut row| row.remove(AGGREGATE_FIELD));
        Ok(match (value, function) {
            (Some(value), _) => value,
            (None, AggregateFunction::Count) => json!(0),
            (None, _) => Json::Null,
        })
    }

    /// One row per group: `_id` is the group key, `aggregate` the value
    pub fn aggregate_rows(
        &self,
        conn: &dyn Connection,
        function: AggregateFunction,
        field: Option<&str>,
    ) -> Result<Vec<Document>> {
        let (filter, options) = self.read_plan()?;
        let stages = AggregateStages {
            filter,
            group_by: &self.group_by,
            sort: options.sort.clone().unwrap_or_default(),
            skip: self.skip,
            limit: self.limit,
        };
        let pipeline = build_pipeline(function, field, &stages).map_err(|e| self.rejected(e))?;
        self.trace(Event::QueryAggregate, &stages.filter);

        let options = FindOptions {
            max_time_ms: self.max_time_ms,
            hint: self.hint.clone(),
            ..FindOptions::default()
        };
        Ok(conn.aggregate(self.collection(), &pipeline, &options)?)
    }

    pub fn sum(&self, conn: &dyn Connection, field: &str) -> Result<Json> {
        self.aggregate_value(conn, AggregateFunction::Sum, Some(field))
    }

    pub fn avg(&self, conn: &dyn Connection, field: &str) -> Result<Json> {
        self.aggregate_value(conn, AggregateFunction::Avg, Some(field))
    }

    pub fn min(&self, conn: &dyn Connection, field: &str) -> Result<Json> {
        self.aggregate_value(conn, AggregateFunction::Min, Some(field))
    }

    pub fn max(&self, conn: &dyn Connection, field: &str) -> Result<Json> {
        self.aggregate_value(conn, AggregateFunction::Max, Some(field))
    }

    /// Runs caller-supplied stages after a `$match` on the current filter
    pub fn aggregate(&self, conn: &dyn Connection, stages: Vec<Json>) -> Result<Vec<Document>> {
        let (filter, _) = self.read_plan()?;
        let mut pipeline = Vec::with_capacity(stages.len() + 1);
        if !filter.is_empty() {
            pipeline.push(json!({ "$match": filter }));
        }
        pipeline.extend(stages);
        self.trace(Event::QueryAggregate, &filter);

        let options = FindOptions {
            max_time_ms: self.max_time_ms,
            hint: self.hint.clone(),
            ..FindOptions::default()
        };
        Ok(conn.aggregate(self.collection(), &pipeline, &options)?)
    }

    // ==================== Writes ====================

    /// Inserts one document and returns its primary key
    pub fn insert(&self, conn: &dyn Connection, document: Document) -> Result<Json> {
        self.trace(Event::QueryInsert, &Map::new());
        let result = conn.insert_one(self.collection(), document)?;
        Ok(result.inserted_ids.into_iter().next().unwrap_or(Json::Null))
    }

    pub fn insert_many(&self, conn: &dyn Connection, documents: Vec<Document>) -> Result<Vec<Json>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        self.trace(Event::QueryInsert, &Map::new());
        Ok(conn.insert_many(self.collection(), documents)?.inserted_ids)
    }

    /// Updates every match; returns the number of modified documents
    pub fn update(&self, conn: &dyn Connection, update: &UpdateSpec) -> Result<u64> {
        let (filter, native) = self.write_plan(update)?;
        self.trace(Event::QueryUpdate, &filter);
        let result =
            conn.update_many(self.collection(), &filter, &native, &UpdateOptions::default())?;
        Ok(result.modified_count)
    }

    /// Updates the first match; returns the number of modified documents
    pub fn update_one(&self, conn: &dyn Connection, update: &UpdateSpec) -> Result<u64> {
        let (filter, native) = self.write_plan(update)?;
        self.trace(Event::QueryUpdate, &filter);
        let result =
            conn.update_one(self.collection(), &filter, &native, &UpdateOptions::default())?;
        Ok(result.modified_count)
    }

    /// Updates the first match or inserts from the filter's equalities
    pub fn upsert(&self, conn: &dyn Connection, update: &UpdateSpec) -> Result<UpdateResult> {
        let (filter, native) = self.write_plan(update)?;
        self.trace(Event::QueryUpdate, &filter);
        Ok(conn.update_one(self.collection(), &filter, &native, &UpdateOptions::upsert())?)
    }

    pub fn increment(
        &self,
        conn: &dyn Connection,
        field: impl Into<String>,
        amount: impl Into<Value>,
    ) -> Result<u64> {
        let amount = amount.into();
        if !matches!(amount, Value::Int(_) | Value::Float(_)) {
            return Err(self.rejected(GrammarError::query_invalid(
                "increment amount must be numeric",
            )));
        }
        let mut inc = Map::new();
        inc.insert(field.into(), amount.to_native());
        self.update(conn, &UpdateSpec::new().operator("$inc", Json::Object(inc)))
    }

    pub fn decrement(
        &self,
        conn: &dyn Connection,
        field: impl Into<String>,
        amount: impl Into<Value>,
    ) -> Result<u64> {
        let negated = match amount.into() {
            Value::Int(i) => Value::Int(-i),
            Value::Float(f) => Value::Float(-f),
            _ => {
                return Err(self.rejected(GrammarError::query_invalid(
                    "decrement amount must be numeric",
                )))
            }
        };
        self.increment(conn, field, negated)
    }

    /// Deletes every match; returns the number removed
    pub fn delete(&self, conn: &dyn Connection) -> Result<u64> {
        let (filter, _) = self.read_plan()?;
        self.trace(Event::QueryDelete, &filter);
        Ok(conn.delete_many(self.collection(), &filter)?.deleted_count)
    }

    pub fn delete_one(&self, conn: &dyn Connection) -> Result<u64> {
        let (filter, _) = self.read_plan()?;
        self.trace(Event::QueryDelete, &filter);
        Ok(conn.delete_one(self.collection(), &filter)?.deleted_count)
    }
}

fn membership<V: Into<Value>>(
    field: impl Into<String>,
    values: impl IntoIterator<Item = V>,
    negate: bool,
) -> Clause {
    Clause::new(ClauseKind::SetMembership {
        field: field.into(),
        values: values.into_iter().map(Into::into).collect(),
        negate,
    })
}

fn nullity(field: impl Into<String>, negate: bool) -> Clause {
    Clause::new(ClauseKind::Nullity {
        field: field.into(),
        negate,
    })
}

fn range(
    field: impl Into<String>,
    low: impl Into<Value>,
    high: impl Into<Value>,
    negate: bool,
) -> Clause {
    Clause::new(ClauseKind::Range {
        field: field.into(),
        low: low.into(),
        high: high.into(),
        negate,
    })
}
