//! Relation Resolution Tests
//!
//! Batch resolution issues at most one lookup per relation, keeps each
//! parent's key order, drops dangling keys and falls back to defaults.

use std::sync::Arc;

use aerodoc::model::{Loaded, ModelSchema, Record};
use aerodoc::relations::{Relation, RelationState};
use aerodoc::store::{Document, MemoryStore};
use serde_json::{json, Value};

// =============================================================================
// Helper Functions
// =============================================================================

fn doc(value: Value) -> Document {
    value.as_object().cloned().unwrap()
}

fn tags() -> Arc<ModelSchema> {
    ModelSchema::new("tags").build()
}

fn users() -> Arc<ModelSchema> {
    ModelSchema::new("users").build()
}

fn posts() -> Arc<ModelSchema> {
    let tags = tags();
    let users = users();
    ModelSchema::new("posts")
        .with_relation("tags", move || Relation::references_many(tags.clone(), "tag_ids"))
        .with_relation("author", move || {
            Relation::inverse_reference(users.clone(), "user_id")
                .with_default_attributes(doc(json!({"name": "Anonymous"})))
        })
        .build()
}

fn tag_names(record: &Record) -> Vec<String> {
    record
        .relation("tags")
        .unwrap()
        .as_many()
        .iter()
        .filter_map(|tag| tag.get_str("name").map(str::to_string))
        .collect()
}

fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    store
        .seed(
            "tags",
            vec![
                json!({"_id": "B", "name": "B"}),
                json!({"_id": "A", "name": "A"}),
            ],
        )
        .unwrap();
    store
        .seed(
            "posts",
            vec![
                json!({"_id": 1, "tag_ids": ["A", "B"]}),
                json!({"_id": 2, "tag_ids": []}),
                json!({"_id": 3, "tag_ids": ["A", "C"]}),
            ],
        )
        .unwrap();
    store
}

// =============================================================================
// Reference Many Tests
// =============================================================================

/// Tags [A,B], [] and [A,C] with C deleted resolve to [A,B], [] and [A].
#[test]
fn test_dangling_keys_are_dropped() {
    let store = seeded_store();
    let posts = posts().query().order_by("_id").with("tags").get(&store).unwrap();

    assert_eq!(tag_names(&posts[0]), vec!["A", "B"]);
    assert!(tag_names(&posts[1]).is_empty());
    assert_eq!(tag_names(&posts[2]), vec!["A"]);

    // one read for posts, one for the whole tag batch
    assert_eq!(store.call_count(), 2);
}

/// Results arrive in store order; each parent keeps its own key order.
#[test]
fn test_parent_key_order_is_preserved() {
    let store = MemoryStore::new();
    store
        .seed(
            "tags",
            vec![
                json!({"_id": "A", "name": "A"}),
                json!({"_id": "B", "name": "B"}),
                json!({"_id": "C", "name": "C"}),
            ],
        )
        .unwrap();
    let mut parents = vec![
        posts().hydrate(doc(json!({"_id": 1, "tag_ids": ["C", "A", "B"]}))),
        posts().hydrate(doc(json!({"_id": 2, "tag_ids": ["B", "C"]}))),
    ];

    let mut relation = posts().relation("tags").unwrap();
    relation.eager_load(&store, &mut parents).unwrap();

    assert_eq!(tag_names(&parents[0]), vec!["C", "A", "B"]);
    assert_eq!(tag_names(&parents[1]), vec!["B", "C"]);
    assert_eq!(relation.state(), RelationState::Resolved);
}

// =============================================================================
// Short Circuit Tests
// =============================================================================

/// An empty parent set issues no store call.
#[test]
fn test_empty_parent_set_issues_no_calls() {
    let store = seeded_store();
    let mut relation = posts().relation("tags").unwrap();
    relation.add_eager_constraints(&[]);
    let results = relation.get_eager(&store).unwrap();

    assert!(results.is_empty());
    assert_eq!(store.call_count(), 0);
}

/// Parents without keys issue no store call either.
#[test]
fn test_keyless_parents_issue_no_calls() {
    let store = seeded_store();
    let mut parents = vec![
        posts().hydrate(doc(json!({"_id": 1}))),
        posts().hydrate(doc(json!({"_id": 2, "tag_ids": null}))),
        posts().hydrate(doc(json!({"_id": 3, "tag_ids": []}))),
    ];

    let mut relation = posts().relation("tags").unwrap();
    relation.eager_load(&store, &mut parents).unwrap();

    assert_eq!(store.call_count(), 0);
    for parent in &parents {
        assert_eq!(parent.relation("tags"), Some(&Loaded::Many(Vec::new())));
    }
}

// =============================================================================
// Inverse Reference Tests
// =============================================================================

/// A missing owner resolves to a fresh default, never null.
#[test]
fn test_inverse_reference_default() {
    let store = seeded_store();
    let post = posts().hydrate(doc(json!({"_id": 1})));

    let mut relation = posts().relation("author").unwrap();
    let author = relation.get_results(&store, &post).unwrap();
    let author = author.as_one().expect("default attached");

    assert_eq!(author.get_str("name"), Some("Anonymous"));
    assert!(!author.exists());
    assert_eq!(author.schema().collection(), "users");
    assert_eq!(store.call_count(), 0);
}

/// Each miss gets its own default instance.
#[test]
fn test_defaults_are_independent() {
    let store = seeded_store();
    let mut parents = posts().query().get(&store).unwrap();
    posts().relation("author").unwrap().eager_load(&store, &mut parents).unwrap();

    let mut first = parents[0].take_relation("author").unwrap().into_records();
    first[0].set_attribute("name", "changed");
    let second = parents[1].relation("author").unwrap().as_one().unwrap();
    assert_eq!(second.get_str("name"), Some("Anonymous"));
}

// =============================================================================
// Registry Tests
// =============================================================================

/// Unknown relation names are reported, not probed.
#[test]
fn test_unknown_relation() {
    let err = posts().relation("comments").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Relation 'comments' is not defined on model 'posts'"
    );
}

/// Persisted changes are visible to the next resolution.
#[test]
fn test_attach_then_resolve() {
    let store = seeded_store();
    let mut post = posts().query().find_or_fail(&store, 2).unwrap();
    let relation = posts().relation("tags").unwrap();
    relation.attach(&store, &mut post, vec![json!("B")]).unwrap();

    let reloaded = posts().query().with("tags").find_or_fail(&store, 2).unwrap();
    assert_eq!(tag_names(&reloaded), vec!["B"]);
}
