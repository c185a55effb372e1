//! Relation mutations
//!
//! Every mutation updates the parent record in memory first. When the
//! parent is persisted the same change is written with one targeted update;
//! unsaved parents are written on their next `save`.

use serde_json::{json, Map, Value as Json};

use crate::clause::{UpdateSpec, Value};
use crate::error::Result;
use crate::identifier::ObjectId;
use crate::model::{Loaded, Record};
use crate::observability::{log_event_with_fields, Event};
use crate::store::{Connection, Document};

use super::descriptor::{Relation, RelationKind};
use super::errors::RelationError;
use super::keys::{canonical_key, coerce_key, native_key};

/// Keys changed by `sync` or `toggle`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncChanges {
    pub attached: Vec<Json>,
    pub detached: Vec<Json>,
}

impl SyncChanges {
    pub fn is_empty(&self) -> bool {
        self.attached.is_empty() && self.detached.is_empty()
    }
}

impl Relation {
    fn require(&self, operation: &'static str, allowed: &[RelationKind]) -> Result<()> {
        if allowed.contains(&self.kind) {
            Ok(())
        } else {
            Err(RelationError::Unsupported {
                operation,
                kind: self.kind.as_str(),
            }
            .into())
        }
    }

    fn logged(&self, operation: &str, parent: &Record) {
        log_event_with_fields(
            Event::RelationMutation,
            &[
                ("relation", &self.name),
                ("operation", operation),
                ("collection", parent.schema().collection()),
                ("persisted", if parent.exists() { "true" } else { "false" }),
            ],
        );
    }

    /// Writes `update` to the persisted parent, optionally narrowed by an
    /// extra equality. No-op for unsaved parents.
    fn persist(
        &self,
        conn: &dyn Connection,
        parent: &Record,
        narrow: Option<(String, Value)>,
        update: UpdateSpec,
    ) -> Result<()> {
        let Some(key) = parent.key().filter(|_| parent.exists()) else {
            return Ok(());
        };
        let mut query = parent.schema().query().where_key(coerce_key(key));
        if let Some((field, value)) = narrow {
            query = query.where_eq(field, value);
        }
        query.update_one(conn, &update)?;
        Ok(())
    }

    // ==================== Single references ====================

    /// Points the parent's foreign key at `related` and caches it
    pub fn associate(&self, parent: &mut Record, related: &Record) -> Result<()> {
        self.require(
            "associate",
            &[RelationKind::ReferenceSingle, RelationKind::InverseReference],
        )?;
        let key = related
            .attribute(&self.owner_key)
            .filter(|v| !v.is_null())
            .ok_or_else(|| RelationError::MissingKey {
                field: self.owner_key.clone(),
            })?;

        parent.set_attribute(self.local_key.clone(), Value::from(native_key(key)));
        parent.set_relation(self.name.clone(), Loaded::One(Some(related.clone())));
        self.logged("associate", parent);
        Ok(())
    }

    /// Clears the parent's foreign key and its cached relation
    pub fn dissociate(&self, parent: &mut Record) -> Result<()> {
        self.require(
            "dissociate",
            &[RelationKind::ReferenceSingle, RelationKind::InverseReference],
        )?;
        parent.unset_attribute(&self.local_key);
        parent.set_relation(self.name.clone(), Loaded::One(None));
        self.logged("dissociate", parent);
        Ok(())
    }

    // ==================== Many references ====================

    fn current_keys(&self, parent: &Record) -> Result<Vec<Json>> {
        match parent.attribute(&self.local_key) {
            None | Some(Json::Null) => Ok(Vec::new()),
            Some(Json::Array(items)) => Ok(items.clone()),
            Some(_) => Err(RelationError::InvalidEmbedded {
                field: self.local_key.clone(),
            }
            .into()),
        }
    }

    fn store_keys(&self, parent: &mut Record, keys: Vec<Json>) {
        parent.set_attribute(self.local_key.clone(), Value::from(Json::Array(keys)));
        parent.take_relation(&self.name);
    }

    /// Adds keys not already present. Returns the keys added.
    pub fn attach(
        &self,
        conn: &dyn Connection,
        parent: &mut Record,
        keys: impl IntoIterator<Item = Json>,
    ) -> Result<Vec<Json>> {
        self.require("attach", &[RelationKind::ReferenceMany])?;
        let mut current = self.current_keys(parent)?;
        let mut present: Vec<String> = current.iter().filter_map(canonical_key).collect();

        let mut added = Vec::new();
        for key in keys {
            let Some(canonical) = canonical_key(&key) else {
                continue;
            };
            if present.contains(&canonical) {
                continue;
            }
            present.push(canonical);
            added.push(native_key(&key));
        }
        if added.is_empty() {
            return Ok(added);
        }

        current.extend(added.iter().cloned());
        self.store_keys(parent, current);
        self.persist(
            conn,
            parent,
            None,
            UpdateSpec::new().operator(
                "$addToSet",
                json!({ self.local_key.as_str(): { "$each": added.clone() } }),
            ),
        )?;
        self.logged("attach", parent);
        Ok(added)
    }

    /// Removes the given keys, or every key when `keys` is `None`.
    /// Returns the keys removed.
    pub fn detach(
        &self,
        conn: &dyn Connection,
        parent: &mut Record,
        keys: Option<Vec<Json>>,
    ) -> Result<Vec<Json>> {
        self.require("detach", &[RelationKind::ReferenceMany])?;
        let current = self.current_keys(parent)?;

        let Some(keys) = keys else {
            if current.is_empty() {
                return Ok(current);
            }
            self.store_keys(parent, Vec::new());
            self.persist(
                conn,
                parent,
                None,
                UpdateSpec::new().operator("$set", json!({ self.local_key.as_str(): [] })),
            )?;
            self.logged("detach", parent);
            return Ok(current);
        };

        let targets: Vec<String> = keys.iter().filter_map(canonical_key).collect();
        let (removed, kept): (Vec<Json>, Vec<Json>) = current.into_iter().partition(|key| {
            canonical_key(key).map_or(false, |canonical| targets.contains(&canonical))
        });
        if removed.is_empty() {
            return Ok(removed);
        }

        self.store_keys(parent, kept);
        self.persist(
            conn,
            parent,
            None,
            UpdateSpec::new().operator(
                "$pull",
                json!({ self.local_key.as_str(): { "$in": removed.clone() } }),
            ),
        )?;
        self.logged("detach", parent);
        Ok(removed)
    }

    /// Makes the key array exactly `keys`, in the given order
    pub fn sync(
        &self,
        conn: &dyn Connection,
        parent: &mut Record,
        keys: impl IntoIterator<Item = Json>,
    ) -> Result<SyncChanges> {
        self.require("sync", &[RelationKind::ReferenceMany])?;
        let current = self.current_keys(parent)?;
        let existing: Vec<String> = current.iter().filter_map(canonical_key).collect();

        let mut desired = Vec::new();
        let mut wanted: Vec<String> = Vec::new();
        let mut changes = SyncChanges::default();
        for key in keys {
            let Some(canonical) = canonical_key(&key) else {
                continue;
            };
            if wanted.contains(&canonical) {
                continue;
            }
            let native = native_key(&key);
            if !existing.contains(&canonical) {
                changes.attached.push(native.clone());
            }
            wanted.push(canonical);
            desired.push(native);
        }
        changes.detached = current
            .into_iter()
            .filter(|key| canonical_key(key).map_or(false, |c| !wanted.contains(&c)))
            .collect();

        if changes.is_empty() {
            return Ok(changes);
        }
        self.write_keys(conn, parent, desired, "sync")?;
        Ok(changes)
    }

    /// Detaches keys that are present and attaches the rest
    pub fn toggle(
        &self,
        conn: &dyn Connection,
        parent: &mut Record,
        keys: impl IntoIterator<Item = Json>,
    ) -> Result<SyncChanges> {
        self.require("toggle", &[RelationKind::ReferenceMany])?;
        let mut current = self.current_keys(parent)?;
        let mut changes = SyncChanges::default();

        for key in keys {
            let Some(canonical) = canonical_key(&key) else {
                continue;
            };
            let position = current
                .iter()
                .position(|k| canonical_key(k).as_deref() == Some(canonical.as_str()));
            match position {
                Some(index) => changes.detached.push(current.remove(index)),
                None => {
                    let native = native_key(&key);
                    changes.attached.push(native.clone());
                    current.push(native);
                }
            }
        }

        if changes.is_empty() {
            return Ok(changes);
        }
        self.write_keys(conn, parent, current, "toggle")?;
        Ok(changes)
    }

    fn write_keys(
        &self,
        conn: &dyn Connection,
        parent: &mut Record,
        keys: Vec<Json>,
        operation: &str,
    ) -> Result<()> {
        self.store_keys(parent, keys.clone());
        self.persist(
            conn,
            parent,
            None,
            UpdateSpec::new().operator("$set", json!({ self.local_key.as_str(): keys })),
        )?;
        self.logged(operation, parent);
        Ok(())
    }

    // ==================== Embedded ====================

    fn related_key(&self) -> String {
        self.related.primary_key().to_string()
    }

    /// Embedded-many children as a mutable array, created when absent
    fn embedded_array<'a>(&self, parent: &'a mut Record) -> Result<&'a mut Vec<Json>> {
        if parent.attribute(&self.local_key).map_or(true, Json::is_null) {
            parent.set_attribute(self.local_key.clone(), Value::from(Json::Array(Vec::new())));
        }
        match parent.attributes_mut().get_mut(&self.local_key) {
            Some(Json::Array(items)) => Ok(items),
            _ => Err(RelationError::InvalidEmbedded {
                field: self.local_key.clone(),
            }
            .into()),
        }
    }

    fn position_of(&self, items: &[Json], key: &Json) -> Option<usize> {
        let target = canonical_key(key)?;
        let field = self.related_key();
        items.iter().position(|item| {
            item.get(&field).and_then(canonical_key).as_deref() == Some(target.as_str())
        })
    }

    /// Re-reads the embedded cache slot if it was loaded
    fn refresh(&self, parent: &mut Record) {
        if parent.relation_loaded(&self.name) {
            let loaded = self.embedded_from(parent);
            parent.set_relation(self.name.clone(), loaded);
        }
    }

    /// Embeds a new child. Embedded-many children get a generated
    /// identifier when they carry none.
    pub fn create(
        &self,
        conn: &dyn Connection,
        parent: &mut Record,
        mut attributes: Document,
    ) -> Result<Record> {
        self.require(
            "create",
            &[RelationKind::EmbeddedSingle, RelationKind::EmbeddedMany],
        )?;
        let update = if self.kind == RelationKind::EmbeddedMany {
            let field = self.related_key();
            if attributes.get(&field).map_or(true, Json::is_null) {
                attributes.insert(field, ObjectId::new().to_native());
            }
            self.embedded_array(parent)?.push(Json::Object(attributes.clone()));
            UpdateSpec::new().operator(
                "$push",
                json!({ self.local_key.as_str(): attributes.clone() }),
            )
        } else {
            parent.set_attribute(self.local_key.clone(), Value::from(attributes.clone()));
            UpdateSpec::new().operator("$set", json!({ self.local_key.as_str(): attributes.clone() }))
        };

        self.persist(conn, parent, None, update)?;
        self.refresh(parent);
        self.logged("create", parent);
        Ok(Record::hydrate(self.related.clone(), attributes, parent.exists()))
    }

    /// Writes `child` back into the parent: replaces the embedded child
    /// with the same identifier, or embeds it when there is none
    pub fn save(&self, conn: &dyn Connection, parent: &mut Record, child: &Record) -> Result<()> {
        self.require("save", &[RelationKind::EmbeddedSingle, RelationKind::EmbeddedMany])?;
        let attributes = child.attributes().clone();

        if self.kind == RelationKind::EmbeddedSingle {
            self.create(conn, parent, attributes)?;
            return Ok(());
        }

        let Some(key) = child.key().cloned() else {
            self.create(conn, parent, attributes)?;
            return Ok(());
        };
        let items = self.embedded_array(parent)?;
        let Some(index) = self.position_of(items, &key) else {
            self.create(conn, parent, attributes)?;
            return Ok(());
        };
        items[index] = Json::Object(attributes.clone());

        let positional = format!("{}.$", self.local_key);
        self.persist(
            conn,
            parent,
            Some((format!("{}.{}", self.local_key, self.related_key()), coerce_key(&key))),
            UpdateSpec::new().operator("$set", json!({ positional: attributes })),
        )?;
        self.refresh(parent);
        self.logged("save", parent);
        Ok(())
    }

    /// Merges `changes` into one embedded child. Embedded-many relations
    /// address the child by `key`; embedded-single ignores it. Returns
    /// false when no child was found.
    pub fn update(
        &self,
        conn: &dyn Connection,
        parent: &mut Record,
        key: Option<&Json>,
        changes: Document,
    ) -> Result<bool> {
        self.require("update", &[RelationKind::EmbeddedSingle, RelationKind::EmbeddedMany])?;
        if changes.is_empty() {
            return Ok(false);
        }

        let (prefix, narrow) = if self.kind == RelationKind::EmbeddedMany {
            let key = key.ok_or_else(|| RelationError::MissingKey {
                field: self.related_key(),
            })?;
            let items = self.embedded_array(parent)?;
            let Some(index) = self.position_of(items, key) else {
                return Ok(false);
            };
            merge_into(&mut items[index], &changes);
            (
                format!("{}.$", self.local_key),
                Some((format!("{}.{}", self.local_key, self.related_key()), coerce_key(key))),
            )
        } else {
            match parent.attributes_mut().get_mut(&self.local_key) {
                Some(child) if child.is_object() => merge_into(child, &changes),
                _ => return Ok(false),
            }
            (self.local_key.clone(), None)
        };

        let set: Map<String, Json> = changes
            .into_iter()
            .map(|(field, value)| (format!("{}.{}", prefix, field), value))
            .collect();
        self.persist(conn, parent, narrow, UpdateSpec::new().operator("$set", Json::Object(set)))?;
        self.refresh(parent);
        self.logged("update", parent);
        Ok(true)
    }

    /// Removes one embedded child. Embedded-many relations address the
    /// child by `key`. Returns false when no child was found.
    pub fn delete(&self, conn: &dyn Connection, parent: &mut Record, key: Option<&Json>) -> Result<bool> {
        self.require("delete", &[RelationKind::EmbeddedSingle, RelationKind::EmbeddedMany])?;

        let update = if self.kind == RelationKind::EmbeddedMany {
            let key = key.ok_or_else(|| RelationError::MissingKey {
                field: self.related_key(),
            })?;
            let items = self.embedded_array(parent)?;
            let Some(index) = self.position_of(items, key) else {
                return Ok(false);
            };
            items.remove(index);
            UpdateSpec::new().operator(
                "$pull",
                json!({ self.local_key.as_str(): { self.related_key(): native_key(key) } }),
            )
        } else {
            if parent.unset_attribute(&self.local_key).is_none() {
                return Ok(false);
            }
            UpdateSpec::new().operator("$unset", json!({ self.local_key.as_str(): "" }))
        };

        self.persist(conn, parent, None, update)?;
        self.refresh(parent);
        self.logged("delete", parent);
        Ok(true)
    }
}

fn merge_into(target: &mut Json, changes: &Document) {
    if let Json::Object(map) = target {
        for (field, value) in changes {
            map.insert(field.clone(), value.clone());
        }
    }
}
