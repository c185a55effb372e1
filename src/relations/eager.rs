//! Eager loading
//!
//! Paths are dotted relation names (`"author.company"`). Each level of a
//! path issues at most one lookup for the whole batch, however many
//! parents or nested paths share it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::model::{Loaded, Record};
use crate::query::QueryBuilder;
use crate::store::Connection;

/// Extra constraint applied to an eager lookup
pub type EagerConstraint = Arc<dyn Fn(QueryBuilder) -> QueryBuilder + Send + Sync>;

/// One requested eager load
#[derive(Clone)]
pub struct EagerLoad {
    path: String,
    constraint: Option<EagerConstraint>,
}

impl EagerLoad {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            constraint: None,
        }
    }

    /// Constrains the lookup of the last relation in `path`
    pub fn constrained<F>(path: impl Into<String>, constraint: F) -> Self
    where
        F: Fn(QueryBuilder) -> QueryBuilder + Send + Sync + 'static,
    {
        Self {
            path: path.into(),
            constraint: Some(Arc::new(constraint)),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_constrained(&self) -> bool {
        self.constraint.is_some()
    }

    fn split(&self) -> (&str, Option<&str>) {
        match self.path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (self.path.as_str(), None),
        }
    }
}

impl fmt::Debug for EagerLoad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EagerLoad")
            .field("path", &self.path)
            .field("constrained", &self.constraint.is_some())
            .finish()
    }
}

/// Requests sharing a first segment
#[derive(Default)]
struct LoadGroup {
    constraint: Option<EagerConstraint>,
    nested: Vec<EagerLoad>,
}

/// Loads every requested relation onto `parents`.
///
/// All parents must share one model. Unknown relation names fail before
/// any lookup for that level is issued.
pub fn load_relations(
    conn: &dyn Connection,
    parents: &mut [Record],
    loads: &[EagerLoad],
) -> Result<()> {
    if parents.is_empty() || loads.is_empty() {
        return Ok(());
    }

    let mut groups: BTreeMap<String, LoadGroup> = BTreeMap::new();
    for load in loads {
        let (head, rest) = load.split();
        let group = groups.entry(head.to_string()).or_default();
        match rest {
            Some(rest) => group.nested.push(EagerLoad {
                path: rest.to_string(),
                constraint: load.constraint.clone(),
            }),
            None => {
                if load.constraint.is_some() {
                    group.constraint = load.constraint.clone();
                }
            }
        }
    }

    let schema = parents[0].schema().clone();
    for (name, group) in groups {
        let mut relation = schema.relation(&name)?;
        if let Some(constraint) = &group.constraint {
            relation = relation.constrain(|query| constraint(query));
        }

        relation.add_eager_constraints(parents);
        let results = relation.get_eager(conn)?;
        relation.match_results(parents, results, &name);

        if !group.nested.is_empty() {
            load_nested(conn, parents, &name, &group.nested)?;
        }
    }
    Ok(())
}

/// Loads `nested` onto the children held under `name`, batching across
/// every parent
fn load_nested(
    conn: &dyn Connection,
    parents: &mut [Record],
    name: &str,
    nested: &[EagerLoad],
) -> Result<()> {
    let mut shapes = Vec::with_capacity(parents.len());
    let mut children = Vec::new();
    for parent in parents.iter_mut() {
        match parent.take_relation(name) {
            Some(Loaded::One(Some(child))) => {
                shapes.push(Shape::One(true));
                children.push(child);
            }
            Some(Loaded::One(None)) | None => shapes.push(Shape::One(false)),
            Some(Loaded::Many(items)) => {
                shapes.push(Shape::Many(items.len()));
                children.extend(items);
            }
        }
    }

    load_relations(conn, &mut children, nested)?;

    let mut children = children.into_iter();
    for (parent, shape) in parents.iter_mut().zip(shapes) {
        let loaded = match shape {
            Shape::One(present) => Loaded::One(if present { children.next() } else { None }),
            Shape::Many(len) => Loaded::Many(children.by_ref().take(len).collect()),
        };
        parent.set_relation(name, loaded);
    }
    Ok(())
}

enum Shape {
    One(bool),
    Many(usize),
}
