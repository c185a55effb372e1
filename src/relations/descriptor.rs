//! Relation descriptors
//!
//! A relation names the parent field it reads, the related model, and for
//! reference kinds the owner key on the related side. It accumulates extra
//! constraints for its lookup and, during batch resolution, the keys
//! captured from the parent batch. Descriptors are never persisted.

use std::fmt;
use std::sync::Arc;

use serde_json::Value as Json;

use crate::model::{ModelSchema, Record};
use crate::query::QueryBuilder;
use crate::store::Document;

/// The closed set of relation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    /// One sub-document stored on the parent
    EmbeddedSingle,
    /// An array of sub-documents stored on the parent
    EmbeddedMany,
    /// The parent holds one key of the related record
    ReferenceSingle,
    /// The parent holds an array of keys of related records
    ReferenceMany,
    /// The parent holds one key of its owner; misses fall back to a default
    InverseReference,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::EmbeddedSingle => "embedded-single",
            RelationKind::EmbeddedMany => "embedded-many",
            RelationKind::ReferenceSingle => "reference-single",
            RelationKind::ReferenceMany => "reference-many",
            RelationKind::InverseReference => "inverse-reference",
        }
    }

    pub fn is_embedded(&self) -> bool {
        matches!(self, RelationKind::EmbeddedSingle | RelationKind::EmbeddedMany)
    }

    /// True for kinds that resolve to a collection
    pub fn is_many(&self) -> bool {
        matches!(self, RelationKind::EmbeddedMany | RelationKind::ReferenceMany)
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle of one relation instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationState {
    /// Just built
    Unconstrained,
    /// Extra lookup constraints added
    Constrained,
    /// Parent batch keys captured
    BatchPrimed,
    /// Batch results fetched and matched
    Resolved,
    /// Resolved for a single parent
    SingleResolved,
}

/// What an inverse reference yields when nothing matches
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    /// A supplied record, cloned per miss
    Instance(Record),
    /// Attributes hydrated into a fresh, unsaved related record per miss
    Attributes(Document),
}

/// A relation between a parent model and a related model
#[derive(Debug, Clone)]
pub struct Relation {
    pub(super) name: String,
    pub(super) kind: RelationKind,
    pub(super) related: Arc<ModelSchema>,
    pub(super) local_key: String,
    pub(super) owner_key: String,
    pub(super) query: QueryBuilder,
    pub(super) default: Option<DefaultValue>,
    pub(super) state: RelationState,
    pub(super) eager_keys: Vec<Json>,
}

impl Relation {
    fn build(kind: RelationKind, related: Arc<ModelSchema>, local_key: impl Into<String>) -> Self {
        let owner_key = related.primary_key().to_string();
        Self {
            name: String::new(),
            kind,
            query: related.query(),
            related,
            local_key: local_key.into(),
            owner_key,
            default: None,
            state: RelationState::Unconstrained,
            eager_keys: Vec::new(),
        }
    }

    /// One sub-document stored under `local_key`
    pub fn embeds_one(related: Arc<ModelSchema>, local_key: impl Into<String>) -> Self {
        Self::build(RelationKind::EmbeddedSingle, related, local_key)
    }

    /// An array of sub-documents stored under `local_key`
    pub fn embeds_many(related: Arc<ModelSchema>, local_key: impl Into<String>) -> Self {
        Self::build(RelationKind::EmbeddedMany, related, local_key)
    }

    /// The parent's `foreign_key` holds the related record's owner key
    pub fn references_one(related: Arc<ModelSchema>, foreign_key: impl Into<String>) -> Self {
        Self::build(RelationKind::ReferenceSingle, related, foreign_key)
    }

    /// The parent's `foreign_key` holds an array of owner keys
    pub fn references_many(related: Arc<ModelSchema>, foreign_key: impl Into<String>) -> Self {
        Self::build(RelationKind::ReferenceMany, related, foreign_key)
    }

    /// The parent's `foreign_key` holds its owner's key
    pub fn inverse_reference(related: Arc<ModelSchema>, foreign_key: impl Into<String>) -> Self {
        Self::build(RelationKind::InverseReference, related, foreign_key)
    }

    /// Matches against `owner_key` on the related side instead of its
    /// primary key
    pub fn with_owner_key(mut self, owner_key: impl Into<String>) -> Self {
        self.owner_key = owner_key.into();
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Adds constraints to the lookup
    pub fn constrain(mut self, build: impl FnOnce(QueryBuilder) -> QueryBuilder) -> Self {
        self.query = build(self.query);
        if self.state == RelationState::Unconstrained {
            self.state = RelationState::Constrained;
        }
        self
    }

    /// Default for misses. Applies to inverse references only; other kinds
    /// ignore it.
    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Default attributes, hydrated fresh for every miss
    pub fn with_default_attributes(self, attributes: Document) -> Self {
        self.with_default(DefaultValue::Attributes(attributes))
    }

    /// Default computed from the owning parent. `build` runs once, now;
    /// a `None` result keeps misses null.
    pub fn with_default_from(
        mut self,
        parent: &Record,
        build: impl FnOnce(&Record) -> Option<Record>,
    ) -> Self {
        self.default = build(parent).map(DefaultValue::Instance);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> RelationKind {
        self.kind
    }

    pub fn related(&self) -> &Arc<ModelSchema> {
        &self.related
    }

    /// The parent field this relation reads: the embedded document(s) or
    /// the foreign key(s)
    pub fn local_key(&self) -> &str {
        &self.local_key
    }

    pub fn foreign_key(&self) -> &str {
        &self.local_key
    }

    pub fn owner_key(&self) -> &str {
        &self.owner_key
    }

    pub fn state(&self) -> RelationState {
        self.state
    }

    pub fn query(&self) -> &QueryBuilder {
        &self.query
    }

    pub fn default_value(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }

    /// A fresh default for one miss
    pub(super) fn make_default(&self) -> Option<Record> {
        if self.kind != RelationKind::InverseReference {
            return None;
        }
        match &self.default {
            Some(DefaultValue::Instance(record)) => Some(record.clone()),
            Some(DefaultValue::Attributes(attributes)) => Some(self.related.make(attributes.clone())),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn users() -> Arc<ModelSchema> {
        ModelSchema::new("users").build()
    }

    #[test]
    fn test_owner_key_defaults_to_related_primary_key() {
        let relation = Relation::references_one(users(), "user_id");
        assert_eq!(relation.owner_key(), "_id");
        assert_eq!(relation.foreign_key(), "user_id");
        assert_eq!(relation.state(), RelationState::Unconstrained);

        let custom = ModelSchema::new("accounts").with_primary_key("code").build();
        assert_eq!(Relation::references_many(custom, "codes").owner_key(), "code");
    }

    #[test]
    fn test_constrain_moves_state() {
        let relation = Relation::references_many(users(), "member_ids")
            .constrain(|q| q.where_eq("active", true));
        assert_eq!(relation.state(), RelationState::Constrained);
        assert_eq!(relation.query().clauses().len(), 1);
    }

    #[test]
    fn test_default_attributes_are_fresh() {
        let attrs = json!({"name": "Anonymous"}).as_object().cloned().unwrap();
        let relation = Relation::inverse_reference(users(), "user_id").with_default_attributes(attrs);
        let made = relation.make_default().unwrap();
        assert_eq!(made.get_str("name"), Some("Anonymous"));
        assert!(!made.exists());
    }

    #[test]
    fn test_default_only_for_inverse() {
        let attrs = json!({"name": "x"}).as_object().cloned().unwrap();
        let relation = Relation::references_one(users(), "user_id").with_default_attributes(attrs);
        assert!(relation.make_default().is_none());
    }

    #[test]
    fn test_default_from_parent_runs_once() {
        let parent = users().make(json!({"nick": "zed"}).as_object().cloned().unwrap());
        let mut calls = 0;
        let relation = Relation::inverse_reference(users(), "owner_id").with_default_from(&parent, |p| {
            calls += 1;
            let mut record = Record::new(users());
            record.set_attribute("name", p.get_str("nick").unwrap_or_default());
            Some(record)
        });
        assert_eq!(calls, 1);
        assert_eq!(relation.make_default().unwrap().get_str("name"), Some("zed"));
        assert_eq!(relation.make_default().unwrap().get_str("name"), Some("zed"));
    }

    #[test]
    fn test_kind_flags() {
        assert!(RelationKind::EmbeddedMany.is_embedded());
        assert!(RelationKind::EmbeddedMany.is_many());
        assert!(!RelationKind::InverseReference.is_many());
        assert_eq!(RelationKind::ReferenceMany.to_string(), "reference-many");
    }
}
