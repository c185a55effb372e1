//! Model schema and relation registry
//!
//! A model schema names the collection, the primary key, and the relations
//! a model declares. Relations are registered as factories keyed by name and
//! built on demand, so models that reference each other never hold each
//! other's schema eagerly.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::grammar::Grammar;
use crate::query::QueryBuilder;
use crate::relations::{Relation, RelationError};
use crate::store::Document;

use super::record::Record;

/// Default primary key field
pub const DEFAULT_PRIMARY_KEY: &str = "_id";

/// Builds a relation descriptor
pub type RelationFactory = Arc<dyn Fn() -> Relation + Send + Sync>;

/// Static description of a model
#[derive(Clone)]
pub struct ModelSchema {
    name: String,
    collection: String,
    primary_key: String,
    relations: BTreeMap<String, RelationFactory>,
}

impl ModelSchema {
    /// Creates a schema for `collection`, named after it
    pub fn new(collection: impl Into<String>) -> Self {
        let collection = collection.into();
        Self {
            name: collection.clone(),
            collection,
            primary_key: DEFAULT_PRIMARY_KEY.to_string(),
            relations: BTreeMap::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = primary_key.into();
        self
    }

    /// Registers a relation under `name`. A later registration under the
    /// same name replaces the earlier one.
    pub fn with_relation<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Relation + Send + Sync + 'static,
    {
        self.relations.insert(name.into(), Arc::new(factory));
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Builds the relation registered under `name`
    pub fn relation(&self, name: &str) -> Result<Relation, RelationError> {
        self.relations
            .get(name)
            .map(|factory| factory().named(name))
            .ok_or_else(|| RelationError::NotFound {
                model: self.name.clone(),
                name: name.to_string(),
            })
    }

    pub fn has_relation(&self, name: &str) -> bool {
        self.relations.contains_key(name)
    }

    /// Registered relation names in sorted order
    pub fn relation_names(&self) -> impl Iterator<Item = &str> {
        self.relations.keys().map(String::as_str)
    }

    /// Clause compiler configured for this model's primary key
    pub fn grammar(&self) -> Grammar {
        Grammar::new(self.primary_key.clone())
    }

    /// Starts a query against this model's collection
    pub fn query(self: &Arc<Self>) -> QueryBuilder {
        QueryBuilder::new(Arc::clone(self))
    }

    /// Hydrates a stored document as an existing record
    pub fn hydrate(self: &Arc<Self>, attributes: Document) -> Record {
        Record::hydrate(Arc::clone(self), attributes, true)
    }

    /// Creates a record that has not been persisted
    pub fn make(self: &Arc<Self>, attributes: Document) -> Record {
        Record::hydrate(Arc::clone(self), attributes, false)
    }
}

impl fmt::Debug for ModelSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSchema")
            .field("name", &self.name)
            .field("collection", &self.collection)
            .field("primary_key", &self.primary_key)
            .field("relations", &self.relations.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relations::RelationKind;

    fn users() -> Arc<ModelSchema> {
        ModelSchema::new("users").build()
    }

    fn posts() -> Arc<ModelSchema> {
        ModelSchema::new("posts")
            .named("Post")
            .with_relation("author", || Relation::inverse_reference(users(), "user_id"))
            .build()
    }

    #[test]
    fn test_defaults() {
        let schema = users();
        assert_eq!(schema.name(), "users");
        assert_eq!(schema.collection(), "users");
        assert_eq!(schema.primary_key(), "_id");
    }

    #[test]
    fn test_relation_registry() {
        let schema = posts();
        let relation = schema.relation("author").unwrap();
        assert_eq!(relation.kind(), RelationKind::InverseReference);
        assert_eq!(relation.name(), "author");
        assert!(schema.has_relation("author"));
        assert_eq!(schema.relation_names().collect::<Vec<_>>(), vec!["author"]);
    }

    #[test]
    fn test_unknown_relation() {
        let err = posts().relation("comments").unwrap_err();
        assert_eq!(
            err,
            RelationError::NotFound {
                model: "Post".into(),
                name: "comments".into()
            }
        );
    }

    #[test]
    fn test_grammar_uses_primary_key() {
        let schema = ModelSchema::new("legacy").with_primary_key("uuid").build();
        assert_eq!(schema.grammar().primary_key(), "uuid");
    }
}
