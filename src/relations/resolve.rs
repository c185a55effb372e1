//! Relation resolution
//!
//! Single-parent resolution (`get_results`) and batch resolution
//! (`add_eager_constraints`, `get_eager`, `match_results`). A batch issues
//! at most one lookup; embedded kinds never issue any.

use std::collections::HashMap;

use serde_json::Value as Json;

use crate::clause::Value;
use crate::error::Result;
use crate::model::{Loaded, Record};
use crate::observability::{log_event_with_fields, Event};
use crate::store::Connection;

use super::descriptor::{Relation, RelationKind, RelationState};
use super::keys::{canonical_key, coerce_key, dedupe_keys, keys_of};

impl Relation {
    /// Resolves the relation for one parent
    pub fn get_results(&mut self, conn: &dyn Connection, parent: &Record) -> Result<Loaded> {
        let loaded = if self.kind.is_embedded() {
            self.embedded_from(parent)
        } else {
            let keys = dedupe_keys(keys_of(parent.attribute(&self.local_key)));
            if keys.is_empty() {
                self.miss()
            } else {
                let results = self.lookup(conn, &keys)?;
                let dictionary = self.dictionary(results);
                self.pick(parent, &dictionary)
            }
        };
        self.state = RelationState::SingleResolved;
        Ok(loaded)
    }

    /// Captures the keys of a parent batch. No store call is made.
    pub fn add_eager_constraints(&mut self, parents: &[Record]) {
        self.eager_keys = if self.kind.is_embedded() {
            Vec::new()
        } else {
            parents
                .iter()
                .flat_map(|parent| keys_of(parent.attribute(&self.local_key)))
                .cloned()
                .collect()
        };
        self.state = RelationState::BatchPrimed;
    }

    /// Fetches related records for the captured batch in one lookup.
    ///
    /// Keys are deduplicated by canonical form. When no parent carried a
    /// key, and always for embedded kinds, nothing is fetched.
    pub fn get_eager(&mut self, conn: &dyn Connection) -> Result<Vec<Record>> {
        let keys = dedupe_keys(self.eager_keys.iter());
        if self.kind.is_embedded() || keys.is_empty() {
            if !self.kind.is_embedded() {
                log_event_with_fields(
                    Event::EagerShortCircuit,
                    &[("relation", &self.name), ("collection", self.related.collection())],
                );
            }
            return Ok(Vec::new());
        }

        let key_count = keys.len().to_string();
        log_event_with_fields(
            Event::EagerLoad,
            &[
                ("relation", &self.name),
                ("collection", self.related.collection()),
                ("keys", &key_count),
            ],
        );
        self.lookup(conn, &keys)
    }

    /// Attaches `results` to each parent under `name`.
    ///
    /// Dangling keys are dropped for many-references and resolve to null
    /// (or the default, for inverse references) for single ones. Embedded
    /// kinds ignore `results` and re-read each parent's own field.
    pub fn match_results(&mut self, parents: &mut [Record], results: Vec<Record>, name: &str) {
        if self.kind.is_embedded() {
            for parent in parents.iter_mut() {
                let loaded = self.embedded_from(parent);
                parent.set_relation(name, loaded);
            }
        } else {
            let dictionary = self.dictionary(results);
            for parent in parents.iter_mut() {
                let loaded = self.pick(parent, &dictionary);
                parent.set_relation(name, loaded);
            }
        }
        self.state = RelationState::Resolved;
    }

    /// Batch resolution in one call: capture, fetch, attach under this
    /// relation's name
    pub fn eager_load(&mut self, conn: &dyn Connection, parents: &mut [Record]) -> Result<()> {
        self.add_eager_constraints(parents);
        let results = self.get_eager(conn)?;
        let name = self.name.clone();
        self.match_results(parents, results, &name);
        Ok(())
    }

    fn lookup(&self, conn: &dyn Connection, keys: &[&Json]) -> Result<Vec<Record>> {
        let operands: Vec<Value> = keys.iter().map(|key| coerce_key(key)).collect();
        self.query
            .clone()
            .where_in(self.owner_key.clone(), operands)
            .get(conn)
    }

    /// Results keyed by owner key; the first record wins on duplicates
    fn dictionary(&self, results: Vec<Record>) -> HashMap<String, Record> {
        let mut dictionary = HashMap::with_capacity(results.len());
        for record in results {
            if let Some(key) = record.attribute(&self.owner_key).and_then(canonical_key) {
                dictionary.entry(key).or_insert(record);
            }
        }
        dictionary
    }

    fn pick(&self, parent: &Record, dictionary: &HashMap<String, Record>) -> Loaded {
        let keys = keys_of(parent.attribute(&self.local_key));
        let hit = |key: &Json| canonical_key(key).and_then(|k| dictionary.get(&k)).cloned();

        match self.kind {
            RelationKind::ReferenceMany => Loaded::Many(keys.into_iter().filter_map(|k| hit(k)).collect()),
            RelationKind::ReferenceSingle => Loaded::One(keys.first().and_then(|k| hit(*k))),
            RelationKind::InverseReference => Loaded::One(
                keys.first()
                    .and_then(|k| hit(*k))
                    .or_else(|| self.make_default()),
            ),
            RelationKind::EmbeddedSingle | RelationKind::EmbeddedMany => self.embedded_from(parent),
        }
    }

    /// Result for a parent without keys
    fn miss(&self) -> Loaded {
        if self.kind.is_many() {
            Loaded::Many(Vec::new())
        } else {
            Loaded::One(self.make_default())
        }
    }

    /// Hydrates the parent's embedded field; non-document entries are skipped
    pub(super) fn embedded_from(&self, parent: &Record) -> Loaded {
        let value = parent.attribute(&self.local_key);
        let hydrate = |doc: &Json| {
            doc.as_object()
                .map(|attrs| Record::hydrate(self.related.clone(), attrs.clone(), parent.exists()))
        };

        match self.kind {
            RelationKind::EmbeddedMany => Loaded::Many(match value {
                Some(Json::Array(items)) => items.iter().filter_map(hydrate).collect(),
                _ => Vec::new(),
            }),
            _ => Loaded::One(value.and_then(hydrate)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::model::ModelSchema;
    use crate::observability::Logger;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn tags() -> Arc<ModelSchema> {
        ModelSchema::new("tags").build()
    }

    fn users() -> Arc<ModelSchema> {
        ModelSchema::new("users").build()
    }

    fn posts() -> Arc<ModelSchema> {
        ModelSchema::new("posts").build()
    }

    fn post(value: Json) -> Record {
        posts().hydrate(value.as_object().cloned().unwrap())
    }

    fn names(loaded: &Loaded) -> Vec<&str> {
        loaded.as_many().iter().filter_map(|r| r.get_str("name")).collect()
    }

    fn tag_store() -> MemoryStore {
        MemoryStore::with_documents(
            "tags",
            vec![
                json!({"_id": "A", "name": "alpha"}),
                json!({"_id": "B", "name": "beta"}),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_reference_many_preserves_parent_key_order() {
        let store = tag_store();
        let mut relation = Relation::references_many(tags(), "tag_ids").named("tags");
        let mut parents = vec![post(json!({"_id": 1, "tag_ids": ["B", "A"]}))];

        relation.eager_load(&store, &mut parents).unwrap();
        assert_eq!(names(parents[0].relation("tags").unwrap()), vec!["beta", "alpha"]);
        assert_eq!(relation.state(), RelationState::Resolved);
    }

    #[test]
    fn test_empty_batch_issues_no_query() {
        let store = tag_store();
        let mut relation = Relation::references_many(tags(), "tag_ids").named("tags");

        let mut parents: Vec<Record> = Vec::new();
        relation.eager_load(&store, &mut parents).unwrap();

        let mut parents = vec![post(json!({"_id": 1})), post(json!({"_id": 2, "tag_ids": []}))];
        let (result, lines) = Logger::capture(|| relation.eager_load(&store, &mut parents));
        result.unwrap();

        assert_eq!(store.call_count(), 0);
        assert!(lines.iter().all(|line| line.contains("EAGER_SHORT_CIRCUIT")));
        assert_eq!(lines.len(), 1);
        assert!(parents.iter().all(|p| p.relation("tags").unwrap().is_empty()));
    }

    #[test]
    fn test_batch_dedupes_keys_into_one_lookup() {
        let store = tag_store();
        let mut relation = Relation::references_many(tags(), "tag_ids");
        let parents = vec![
            post(json!({"_id": 1, "tag_ids": ["A", "B"]})),
            post(json!({"_id": 2, "tag_ids": ["A"]})),
        ];
        relation.add_eager_constraints(&parents);
        assert_eq!(relation.state(), RelationState::BatchPrimed);
        assert_eq!(store.call_count(), 0);

        relation.get_eager(&store).unwrap();
        let calls = store.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            Json::Object(calls[0].filter.clone()),
            json!({"_id": {"$in": ["A", "B"]}})
        );
    }

    #[test]
    fn test_single_results() {
        let store =
            MemoryStore::with_documents("users", vec![json!({"_id": 10, "name": "Ann"})]).unwrap();
        let mut relation = Relation::references_one(users(), "user_id");

        let found = relation
            .get_results(&store, &post(json!({"user_id": 10})))
            .unwrap();
        assert_eq!(found.as_one().and_then(|r| r.get_str("name")), Some("Ann"));
        assert_eq!(relation.state(), RelationState::SingleResolved);

        let dangling = relation
            .get_results(&store, &post(json!({"user_id": 11})))
            .unwrap();
        assert_eq!(dangling, Loaded::One(None));

        store.reset_calls();
        let absent = relation.get_results(&store, &post(json!({}))).unwrap();
        assert_eq!(absent, Loaded::One(None));
        assert_eq!(store.call_count(), 0);
    }

    #[test]
    fn test_inverse_reference_default() {
        let store = MemoryStore::new();
        let attrs = json!({"name": "Anonymous"}).as_object().cloned().unwrap();
        let mut relation = Relation::inverse_reference(users(), "user_id")
            .named("author")
            .with_default_attributes(attrs);

        let mut parents = vec![post(json!({"_id": 1})), post(json!({"_id": 2, "user_id": 99}))];
        relation.eager_load(&store, &mut parents).unwrap();

        for parent in &parents {
            let author = parent.relation("author").unwrap().as_one().unwrap();
            assert_eq!(author.get_str("name"), Some("Anonymous"));
            assert!(!author.exists());
        }

        let single = relation.get_results(&store, &post(json!({}))).unwrap();
        assert_eq!(single.as_one().and_then(|r| r.get_str("name")), Some("Anonymous"));
    }

    #[test]
    fn test_identifier_keys_match_across_forms() {
        let hex = "507f1f77bcf86cd799439011";
        let store = MemoryStore::with_documents(
            "users",
            vec![json!({"_id": {"$oid": hex}, "name": "Ann"})],
        )
        .unwrap();
        let mut relation = Relation::references_one(users(), "user_id").named("user");
        let mut parents = vec![post(json!({"user_id": hex}))];
        relation.eager_load(&store, &mut parents).unwrap();
        assert_eq!(
            parents[0].relation("user").unwrap().as_one().and_then(|r| r.get_str("name")),
            Some("Ann")
        );
    }

    #[test]
    fn test_keys_of_different_json_types_stay_apart() {
        let store = MemoryStore::with_documents(
            "tags",
            vec![
                json!({"_id": 7, "name": "int"}),
                json!({"_id": "7", "name": "string"}),
            ],
        )
        .unwrap();
        let mut relation = Relation::references_one(tags(), "tag_id").named("tag");
        let mut parents = vec![
            post(json!({"_id": 1, "tag_id": 7})),
            post(json!({"_id": 2, "tag_id": "7"})),
        ];
        relation.eager_load(&store, &mut parents).unwrap();

        let picked: Vec<Option<&str>> = parents
            .iter()
            .map(|p| p.relation("tag").unwrap().as_one().and_then(|r| r.get_str("name")))
            .collect();
        assert_eq!(picked, vec![Some("int"), Some("string")]);

        let calls = store.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            Json::Object(calls[0].filter.clone()),
            json!({"_id": {"$in": [7, "7"]}})
        );
    }

    #[test]
    fn test_failed_lookup_leaves_state_unresolved() {
        let store = MemoryStore::with_documents("users", vec![json!({"_id": 10})]).unwrap();
        let mut relation =
            Relation::references_one(users(), "user_id").constrain(|q| q.where_op("age", "~", 3));

        let err = relation
            .get_results(&store, &post(json!({"user_id": 10})))
            .unwrap_err();
        assert_eq!(err.code(), "AERO_QUERY_UNSUPPORTED_OPERATOR");
        assert_eq!(relation.state(), RelationState::Constrained);
        assert_eq!(store.call_count(), 0);
    }

    #[test]
    fn test_embedded_kinds_never_query() {
        let store = MemoryStore::new();
        let comments = ModelSchema::new("comments").build();
        let mut many = Relation::embeds_many(comments.clone(), "comments").named("comments");
        let mut one = Relation::embeds_one(comments, "pinned").named("pinned");

        let mut parents = vec![post(json!({
            "_id": 1,
            "comments": [{"body": "a"}, 5, {"body": "b"}],
            "pinned": {"body": "p"}
        }))];
        many.eager_load(&store, &mut parents).unwrap();
        one.eager_load(&store, &mut parents).unwrap();

        let bodies: Vec<&str> = parents[0]
            .relation("comments")
            .unwrap()
            .as_many()
            .iter()
            .filter_map(|r| r.get_str("body"))
            .collect();
        assert_eq!(bodies, vec!["a", "b"]);
        let pinned = parents[0].relation("pinned").unwrap().as_one().unwrap();
        assert_eq!(pinned.get_str("body"), Some("p"));
        assert!(pinned.exists());
        assert_eq!(store.call_count(), 0);
    }

    #[test]
    fn test_constraints_apply_to_lookup() {
        let store = MemoryStore::with_documents(
            "tags",
            vec![
                json!({"_id": "A", "name": "alpha", "hidden": true}),
                json!({"_id": "B", "name": "beta", "hidden": false}),
            ],
        )
        .unwrap();
        let mut relation = Relation::references_many(tags(), "tag_ids")
            .named("tags")
            .constrain(|q| q.where_eq("hidden", false));
        let mut parents = vec![post(json!({"tag_ids": ["A", "B"]}))];
        relation.eager_load(&store, &mut parents).unwrap();
        assert_eq!(names(parents[0].relation("tags").unwrap()), vec!["beta"]);
    }
}
