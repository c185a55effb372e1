//! Clause intermediate representation
//!
//! A clause list is an ordered sequence; each clause carries the combinator
//! that joins it to its siblings at the same nesting level.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use super::value::Value;

/// How a clause joins its siblings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    #[default]
    And,
    Or,
}

impl Combinator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Combinator::And => "and",
            Combinator::Or => "or",
        }
    }
}

/// A GeoJSON point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

impl GeoPoint {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }
}

/// Type tags accepted by a type check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TypeTag {
    Double,
    String,
    Object,
    Array,
    BinData,
    ObjectId,
    Bool,
    Date,
    Null,
    Regex,
    Int,
    Long,
    Decimal,
    /// Any numeric type
    Number,
}

impl TypeTag {
    /// Store alias for this type
    pub fn alias(&self) -> &'static str {
        match self {
            TypeTag::Double => "double",
            TypeTag::String => "string",
            TypeTag::Object => "object",
            TypeTag::Array => "array",
            TypeTag::BinData => "binData",
            TypeTag::ObjectId => "objectId",
            TypeTag::Bool => "bool",
            TypeTag::Date => "date",
            TypeTag::Null => "null",
            TypeTag::Regex => "regex",
            TypeTag::Int => "int",
            TypeTag::Long => "long",
            TypeTag::Decimal => "decimal",
            TypeTag::Number => "number",
        }
    }
}

/// The predicate carried by a clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClauseKind {
    /// `field <operator> value`; the operator token is resolved at compile time
    Comparison {
        field: String,
        operator: String,
        value: Value,
    },
    SetMembership {
        field: String,
        values: Vec<Value>,
        #[serde(default)]
        negate: bool,
    },
    Nullity {
        field: String,
        #[serde(default)]
        negate: bool,
    },
    /// Inclusive range
    Range {
        field: String,
        low: Value,
        high: Value,
        #[serde(default)]
        negate: bool,
    },
    Nested {
        clauses: Vec<Clause>,
    },
    /// Native fragment inserted without interpretation
    Raw {
        fragment: Map<String, Json>,
    },
    /// Regular expression in store syntax
    PatternMatch {
        field: String,
        pattern: String,
        #[serde(default)]
        flags: String,
    },
    Existence {
        field: String,
        expected: bool,
    },
    TypeCheck {
        field: String,
        type_tag: TypeTag,
    },
    ArraySize {
        field: String,
        size: u64,
    },
    ArrayContainsAll {
        field: String,
        values: Vec<Value>,
    },
    ArrayElementMatch {
        field: String,
        clauses: Vec<Clause>,
    },
    /// Distances are in meters
    ProximitySearch {
        field: String,
        point: GeoPoint,
        #[serde(default)]
        min_distance: Option<f64>,
        #[serde(default)]
        max_distance: Option<f64>,
    },
    /// `geometry` is a GeoJSON object (Polygon, MultiPolygon, ...)
    RegionContainment {
        field: String,
        geometry: Json,
    },
}

impl ClauseKind {
    /// The field this clause targets, if it targets exactly one
    pub fn field(&self) -> Option<&str> {
        match self {
            ClauseKind::Comparison { field, .. }
            | ClauseKind::SetMembership { field, .. }
            | ClauseKind::Nullity { field, .. }
            | ClauseKind::Range { field, .. }
            | ClauseKind::PatternMatch { field, .. }
            | ClauseKind::Existence { field, .. }
            | ClauseKind::TypeCheck { field, .. }
            | ClauseKind::ArraySize { field, .. }
            | ClauseKind::ArrayContainsAll { field, .. }
            | ClauseKind::ArrayElementMatch { field, .. }
            | ClauseKind::ProximitySearch { field, .. }
            | ClauseKind::RegionContainment { field, .. } => Some(field),
            ClauseKind::Nested { .. } | ClauseKind::Raw { .. } => None,
        }
    }
}

/// A single predicate unit plus its combinator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    #[serde(flatten)]
    pub kind: ClauseKind,
    #[serde(default)]
    pub combinator: Combinator,
}

impl Clause {
    /// Creates an AND clause
    pub fn new(kind: ClauseKind) -> Self {
        Self {
            kind,
            combinator: Combinator::And,
        }
    }

    /// Switches this clause to OR
    pub fn or(mut self) -> Self {
        self.combinator = Combinator::Or;
        self
    }

    pub fn with_combinator(mut self, combinator: Combinator) -> Self {
        self.combinator = combinator;
        self
    }

    pub fn comparison(
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self::new(ClauseKind::Comparison {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
        })
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::comparison(field, "=", value)
    }

    pub fn in_set(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::new(ClauseKind::SetMembership {
            field: field.into(),
            values,
            negate: false,
        })
    }

    pub fn nested(clauses: Vec<Clause>) -> Self {
        Self::new(ClauseKind::Nested { clauses })
    }

    pub fn raw(fragment: Map<String, Json>) -> Self {
        Self::new(ClauseKind::Raw { fragment })
    }
}
