//! Offset and cursor pagination
//!
//! Offset pages are plain arithmetic over skip/limit. Cursor pages use a
//! keyset predicate over the active sort keys; the cursor carries the sort
//! key values of a boundary record and the direction to continue in.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::Serialize;
use serde_json::{Map, Value as Json};
use thiserror::Error;

use crate::clause::{Clause, SortDirection, SortSpec, Value};

const DIRECTION_KEY: &str = "_pointsToNextItems";

/// Cursor errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CursorError {
    #[error("Malformed cursor: {0}")]
    Malformed(String),

    #[error("Cursor is missing sort key '{0}'")]
    MissingKey(String),
}

/// Offset of a page. Pages below 1 clamp to 1.
pub fn page_offset(page: i64, per_page: u64) -> u64 {
    let page = page.max(1) as u64;
    (page - 1).saturating_mul(per_page)
}

/// A length-aware page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub per_page: u64,
    pub current_page: u64,
    pub last_page: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, per_page: u64, page: i64) -> Self {
        let per_page = per_page.max(1);
        Self {
            items,
            total,
            per_page,
            current_page: page.max(1) as u64,
            last_page: total.div_ceil(per_page).max(1),
        }
    }

    pub fn has_more_pages(&self) -> bool {
        self.current_page < self.last_page
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            per_page: self.per_page,
            current_page: self.current_page,
            last_page: self.last_page,
        }
    }
}

/// Position in a keyset-paginated result
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor {
    parameters: Map<String, Json>,
    points_to_next: bool,
}

impl Cursor {
    pub fn new(parameters: Map<String, Json>, points_to_next: bool) -> Self {
        Self {
            parameters,
            points_to_next,
        }
    }

    pub fn parameter(&self, field: &str) -> Option<&Json> {
        self.parameters.get(field)
    }

    pub fn parameters(&self) -> &Map<String, Json> {
        &self.parameters
    }

    pub fn points_to_next_items(&self) -> bool {
        self.points_to_next
    }

    pub fn points_to_previous_items(&self) -> bool {
        !self.points_to_next
    }

    /// URL-safe base64 of the cursor's JSON form
    pub fn encode(&self) -> String {
        let mut doc = self.parameters.clone();
        doc.insert(DIRECTION_KEY.into(), Json::Bool(self.points_to_next));
        URL_SAFE_NO_PAD.encode(Json::Object(doc).to_string())
    }

    pub fn decode(encoded: &str) -> Result<Self, CursorError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded.trim_end_matches('='))
            .map_err(|e| CursorError::Malformed(e.to_string()))?;
        let doc: Json =
            serde_json::from_slice(&bytes).map_err(|e| CursorError::Malformed(e.to_string()))?;
        let Json::Object(mut parameters) = doc else {
            return Err(CursorError::Malformed("expected a JSON object".into()));
        };
        let points_to_next = parameters
            .remove(DIRECTION_KEY)
            .and_then(|v| v.as_bool())
            .ok_or_else(|| CursorError::Malformed(format!("missing {}", DIRECTION_KEY)))?;
        Ok(Self::new(parameters, points_to_next))
    }
}

/// One page of a keyset-paginated result, in forward order
#[derive(Debug, Clone, PartialEq)]
pub struct CursorPage<T> {
    pub items: Vec<T>,
    pub per_page: u64,
    pub has_more: bool,
    pub next_cursor: Option<Cursor>,
    pub previous_cursor: Option<Cursor>,
}

impl<T> CursorPage<T> {
    /// Builds a page from an over-fetched result (`per_page + 1` rows
    /// requested). Rows fetched backward arrive in reversed sort order and
    /// are flipped before the boundary cursors are taken.
    pub fn from_overfetch(
        mut items: Vec<T>,
        per_page: u64,
        orders: &[SortSpec],
        cursor: Option<&Cursor>,
        value_of: impl Fn(&T, &str) -> Option<Json>,
    ) -> Self {
        let has_more = items.len() as u64 > per_page;
        items.truncate(per_page as usize);

        let backward = cursor.map(Cursor::points_to_previous_items).unwrap_or(false);
        if backward {
            items.reverse();
        }

        let cursor_for = |item: &T, points_to_next: bool| {
            let parameters = orders
                .iter()
                .map(|o| (o.field.clone(), value_of(item, &o.field).unwrap_or(Json::Null)))
                .collect();
            Cursor::new(parameters, points_to_next)
        };

        let next_cursor = match cursor {
            None if !has_more => None,
            Some(c) if c.points_to_next_items() && !has_more => None,
            _ => items.last().map(|item| cursor_for(item, true)),
        };
        let previous_cursor = match cursor {
            None => None,
            Some(c) if c.points_to_previous_items() && !has_more => None,
            Some(_) => items.first().map(|item| cursor_for(item, false)),
        };

        Self {
            items,
            per_page,
            has_more,
            next_cursor,
            previous_cursor,
        }
    }
}

/// Keyset predicate selecting the rows after (or before) the cursor.
///
/// For sort keys `k1..kn` this is the disjunction over `i` of
/// `k1 = v1 AND .. AND k(i-1) = v(i-1) AND ki <op> vi`, where `<op>` is
/// `>` when moving along an ascending key and `<` otherwise.
pub fn keyset_clause(orders: &[SortSpec], cursor: &Cursor) -> Result<Clause, CursorError> {
    let mut branches = Vec::with_capacity(orders.len());

    for (i, order) in orders.iter().enumerate() {
        let mut conjuncts = Vec::with_capacity(i + 1);
        for earlier in &orders[..i] {
            conjuncts.push(Clause::eq(earlier.field.clone(), cursor_value(cursor, &earlier.field)?));
        }

        let ascending = order.direction == SortDirection::Asc;
        let operator = if ascending == cursor.points_to_next_items() {
            ">"
        } else {
            "<"
        };
        conjuncts.push(Clause::comparison(
            order.field.clone(),
            operator,
            cursor_value(cursor, &order.field)?,
        ));
        branches.push(Clause::nested(conjuncts).or());
    }

    Ok(Clause::nested(branches))
}

fn cursor_value(cursor: &Cursor, field: &str) -> Result<Value, CursorError> {
    cursor
        .parameter(field)
        .cloned()
        .map(Value::from)
        .ok_or_else(|| CursorError::MissingKey(field.to_string()))
}
