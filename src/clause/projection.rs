//! Projection specifications

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fields marked for inclusion or exclusion.
///
/// Entries keep insertion order; marking the same field twice keeps the
/// latest mark in the original position. Homogeneity is checked by the
/// grammar, not here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct ProjectionSpec {
    entries: Vec<(String, bool)>,
}

impl ProjectionSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a field as included
    pub fn include(mut self, field: impl Into<String>) -> Self {
        self.mark(field.into(), true);
        self
    }

    /// Marks a field as excluded
    pub fn exclude(mut self, field: impl Into<String>) -> Self {
        self.mark(field.into(), false);
        self
    }

    pub(crate) fn mark(&mut self, field: String, include: bool) {
        match self.entries.iter_mut().find(|(f, _)| *f == field) {
            Some(entry) => entry.1 = include,
            None => self.entries.push((field, include)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `(field, included)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.entries.iter().map(|(f, inc)| (f.as_str(), *inc))
    }
}

impl TryFrom<Map<String, Value>> for ProjectionSpec {
    type Error = String;

    fn try_from(map: Map<String, Value>) -> Result<Self, Self::Error> {
        let mut spec = ProjectionSpec::new();
        for (field, flag) in map {
            let include = match &flag {
                Value::Bool(b) => *b,
                Value::Number(n) => n.as_i64() != Some(0),
                other => return Err(format!("invalid projection flag for '{}': {}", field, other)),
            };
            spec.mark(field, include);
        }
        Ok(spec)
    }
}

impl From<ProjectionSpec> for Map<String, Value> {
    fn from(spec: ProjectionSpec) -> Self {
        spec.entries
            .into_iter()
            .map(|(f, inc)| (f, Value::from(i32::from(inc))))
            .collect()
    }
}
