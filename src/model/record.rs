//! Records
//!
//! A record is a document bound to its model schema, plus a cache of loaded
//! relations. Hydration is explicit: the `exists` flag says whether the
//! attributes came from the store.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value as Json};

use crate::clause::{UpdateSpec, Value};
use crate::error::Result;
use crate::store::{resolve_path, Connection, Document};

use super::schema::ModelSchema;

/// A cached relation value
#[derive(Debug, Clone, PartialEq)]
pub enum Loaded {
    One(Option<Record>),
    Many(Vec<Record>),
}

impl Loaded {
    /// The single related record, if this is a loaded single relation
    pub fn as_one(&self) -> Option<&Record> {
        match self {
            Loaded::One(record) => record.as_ref(),
            Loaded::Many(_) => None,
        }
    }

    /// The related records; a single relation yields zero or one
    pub fn as_many(&self) -> &[Record] {
        match self {
            Loaded::One(Some(record)) => std::slice::from_ref(record),
            Loaded::One(None) => &[],
            Loaded::Many(records) => records,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_many().is_empty()
    }

    pub fn into_records(self) -> Vec<Record> {
        match self {
            Loaded::One(record) => record.into_iter().collect(),
            Loaded::Many(records) => records,
        }
    }

    pub fn to_json(&self) -> Json {
        match self {
            Loaded::One(Some(record)) => record.to_json(),
            Loaded::One(None) => Json::Null,
            Loaded::Many(records) => Json::Array(records.iter().map(Record::to_json).collect()),
        }
    }
}

/// A document bound to a model
#[derive(Debug, Clone)]
pub struct Record {
    schema: Arc<ModelSchema>,
    attributes: Document,
    relations: BTreeMap<String, Loaded>,
    exists: bool,
}

impl Record {
    /// Creates an empty record that has not been persisted
    pub fn new(schema: Arc<ModelSchema>) -> Self {
        Self::hydrate(schema, Map::new(), false)
    }

    /// Builds a record from raw attributes without any validation
    pub fn hydrate(schema: Arc<ModelSchema>, attributes: Document, exists: bool) -> Self {
        Self {
            schema,
            attributes,
            relations: BTreeMap::new(),
            exists,
        }
    }

    pub fn schema(&self) -> &Arc<ModelSchema> {
        &self.schema
    }

    /// Reads an attribute. Dotted paths reach into sub-documents.
    pub fn attribute(&self, field: &str) -> Option<&Json> {
        match self.attributes.get(field) {
            Some(value) => Some(value),
            None if field.contains('.') => resolve_path(&self.attributes, field).into_iter().next(),
            None => None,
        }
    }

    /// Reads a string attribute
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.attribute(field).and_then(Json::as_str)
    }

    /// Writes a top-level attribute in native form
    pub fn set_attribute(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(field.into(), value.into().to_native());
    }

    pub fn unset_attribute(&mut self, field: &str) -> Option<Json> {
        self.attributes.remove(field)
    }

    pub fn attributes(&self) -> &Document {
        &self.attributes
    }

    pub(crate) fn attributes_mut(&mut self) -> &mut Document {
        &mut self.attributes
    }

    pub fn into_attributes(self) -> Document {
        self.attributes
    }

    /// Primary key value
    pub fn key(&self) -> Option<&Json> {
        self.attributes
            .get(self.schema.primary_key())
            .filter(|v| !v.is_null())
    }

    /// True when the attributes came from, or were written to, the store
    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn set_exists(&mut self, exists: bool) {
        self.exists = exists;
    }

    /// Caches a relation value, replacing any previous one
    pub fn set_relation(&mut self, name: impl Into<String>, value: Loaded) {
        self.relations.insert(name.into(), value);
    }

    pub fn relation(&self, name: &str) -> Option<&Loaded> {
        self.relations.get(name)
    }

    pub fn relation_mut(&mut self, name: &str) -> Option<&mut Loaded> {
        self.relations.get_mut(name)
    }

    pub fn take_relation(&mut self, name: &str) -> Option<Loaded> {
        self.relations.remove(name)
    }

    pub fn relation_loaded(&self, name: &str) -> bool {
        self.relations.contains_key(name)
    }

    pub fn relations(&self) -> &BTreeMap<String, Loaded> {
        &self.relations
    }

    /// Attributes plus every loaded relation under its name
    pub fn to_json(&self) -> Json {
        let mut out = self.attributes.clone();
        for (name, loaded) in &self.relations {
            out.insert(name.clone(), loaded.to_json());
        }
        Json::Object(out)
    }

    /// Inserts the record, or writes its attributes back by primary key
    pub fn save(&mut self, conn: &dyn Connection) -> Result<()> {
        let primary_key = self.schema.primary_key().to_string();

        match self.key().cloned().filter(|_| self.exists) {
            Some(key) => {
                let mut changes = self.attributes.clone();
                changes.remove(&primary_key);
                self.schema
                    .query()
                    .where_eq(primary_key, Value::from(key))
                    .update_one(conn, &UpdateSpec::from(changes))?;
            }
            None => {
                let id = self.schema.query().insert(conn, self.attributes.clone())?;
                self.attributes.insert(primary_key, id);
                self.exists = true;
            }
        }
        Ok(())
    }

    /// Deletes the record by primary key. Returns whether a document was removed.
    pub fn delete(&mut self, conn: &dyn Connection) -> Result<bool> {
        let Some(key) = self.key().cloned().filter(|_| self.exists) else {
            return Ok(false);
        };
        let deleted = self
            .schema
            .query()
            .where_eq(self.schema.primary_key().to_string(), Value::from(key))
            .delete_one(conn)?;
        self.exists = false;
        Ok(deleted > 0)
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.schema.collection() == other.schema.collection()
            && self.exists == other.exists
            && self.attributes == other.attributes
            && self.relations == other.relations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::ObjectId;
    use crate::store::{FindOptions, MemoryStore};
    use serde_json::json;

    fn users() -> Arc<ModelSchema> {
        ModelSchema::new("users").build()
    }

    fn attrs(value: Json) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_hydrate_marks_existing() {
        let record = Record::hydrate(users(), attrs(json!({"_id": 1, "name": "Ann"})), true);
        assert!(record.exists());
        assert_eq!(record.key(), Some(&json!(1)));
        assert_eq!(record.get_str("name"), Some("Ann"));
    }

    #[test]
    fn test_dotted_attribute() {
        let record = users().make(attrs(json!({"profile": {"city": "Oslo"}})));
        assert_eq!(record.get_str("profile.city"), Some("Oslo"));
        assert!(!record.exists());
    }

    #[test]
    fn test_set_attribute_uses_native_form() {
        let mut record = Record::new(users());
        let id = ObjectId::parse("507f1f77bcf86cd799439011").unwrap();
        record.set_attribute("team_id", id);
        assert_eq!(
            record.attribute("team_id"),
            Some(&json!({"$oid": "507f1f77bcf86cd799439011"}))
        );
    }

    #[test]
    fn test_relation_cache() {
        let mut record = Record::new(users());
        assert!(!record.relation_loaded("team"));
        record.set_relation("team", Loaded::One(None));
        assert!(record.relation_loaded("team"));
        assert!(record.relation("team").unwrap().is_empty());

        let team = users().make(attrs(json!({"name": "core"})));
        record.set_relation("team", Loaded::One(Some(team.clone())));
        assert_eq!(record.relation("team").unwrap().as_one(), Some(&team));
        assert_eq!(
            record.to_json(),
            json!({"team": {"name": "core"}})
        );
    }

    #[test]
    fn test_save_inserts_then_updates() {
        let store = MemoryStore::new();
        let mut record = users().make(attrs(json!({"name": "Ann"})));
        record.save(&store).unwrap();
        assert!(record.exists());
        assert!(record.key().is_some());

        record.set_attribute("name", "Anna");
        record.save(&store).unwrap();

        let stored = store
            .find("users", &Document::new(), &FindOptions::new())
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0]["name"], json!("Anna"));
    }

    #[test]
    fn test_delete() {
        let store = MemoryStore::with_documents("users", vec![json!({"_id": 1})]).unwrap();
        let mut record = users().hydrate(attrs(json!({"_id": 1})));
        assert!(record.delete(&store).unwrap());
        assert!(!record.exists());
        assert!(store.documents("users").is_empty());
    }
}
