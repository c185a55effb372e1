//! Pagination Tests
//!
//! Offset pages clamp their page number; keyset pages over-fetch one row
//! and read the same in both directions.

use aerodoc::identifier::ObjectId;
use aerodoc::model::Record;
use aerodoc::query::{Cursor, QueryBuilder};
use aerodoc::store::MemoryStore;
use serde_json::json;

// =============================================================================
// Helper Functions
// =============================================================================

fn store_with(count: i64) -> MemoryStore {
    let documents = (1..=count)
        .map(|i| json!({"_id": i, "rank": (i % 3)}))
        .collect();
    MemoryStore::with_documents("items", documents).unwrap()
}

fn ids(records: &[Record]) -> Vec<i64> {
    records
        .iter()
        .filter_map(|r| r.key().and_then(|k| k.as_i64()))
        .collect()
}

fn items() -> QueryBuilder {
    QueryBuilder::for_collection("items")
}

// =============================================================================
// Offset Pagination Tests
// =============================================================================

/// Page numbers below one clamp to the first page.
#[test]
fn test_for_page_clamps() {
    for page in [0, -5, 1] {
        let query = items().for_page(page, 10);
        assert_eq!(query.skip_value(), Some(0));
        assert_eq!(query.limit_value(), Some(10));
    }
    assert_eq!(items().for_page(3, 10).skip_value(), Some(20));
}

/// Length-aware pages report the total and the last page.
#[test]
fn test_paginate_reports_totals() {
    let store = store_with(7);
    let page = items().order_by("_id").paginate(&store, Some(3), 3).unwrap();

    assert_eq!(page.total, 7);
    assert_eq!(page.last_page, 3);
    assert_eq!(ids(&page.items), vec![7]);
    assert!(!page.has_more_pages());

    let clamped = items().order_by("_id").paginate(&store, Some(3), -2).unwrap();
    assert_eq!(clamped.current_page, 1);
    assert_eq!(ids(&clamped.items), vec![1, 2, 3]);
}

// =============================================================================
// Cursor Pagination Tests
// =============================================================================

/// N + 1 available rows give N rows and `has_more`.
#[test]
fn test_overfetch_sets_has_more() {
    let store = store_with(4);
    let page = items().cursor_paginate(&store, Some(3), None).unwrap();

    assert_eq!(ids(&page.items), vec![1, 2, 3]);
    assert!(page.has_more);
    assert!(page.next_cursor.is_some());
    assert!(page.previous_cursor.is_none());
}

/// Walking forward then back returns the first page in forward order.
#[test]
fn test_backward_page_matches_forward_page() {
    let store = store_with(7);
    let first = items().cursor_paginate(&store, Some(3), None).unwrap();

    let next = first.next_cursor.clone().unwrap();
    let second = items().cursor_paginate(&store, Some(3), Some(&next)).unwrap();
    assert_eq!(ids(&second.items), vec![4, 5, 6]);
    assert!(second.has_more);

    let back = second.previous_cursor.clone().unwrap();
    assert!(back.points_to_previous_items());
    let again = items().cursor_paginate(&store, Some(3), Some(&back)).unwrap();
    assert_eq!(ids(&again.items), ids(&first.items));
}

/// The last forward page has no next cursor.
#[test]
fn test_last_page_has_no_next_cursor() {
    let store = store_with(5);
    let first = items().cursor_paginate(&store, Some(3), None).unwrap();
    let next = first.next_cursor.unwrap();
    let last = items().cursor_paginate(&store, Some(3), Some(&next)).unwrap();

    assert_eq!(ids(&last.items), vec![4, 5]);
    assert!(!last.has_more);
    assert!(last.next_cursor.is_none());
    assert!(last.previous_cursor.is_some());
}

/// Secondary orderings break ties on the primary key.
#[test]
fn test_cursor_with_secondary_order() {
    let store = store_with(6);
    let query = items().order_by_desc("rank");

    let first = query.cursor_paginate(&store, Some(2), None).unwrap();
    assert_eq!(ids(&first.items), vec![2, 5]);

    let next = first.next_cursor.unwrap();
    let second = query.cursor_paginate(&store, Some(2), Some(&next)).unwrap();
    assert_eq!(ids(&second.items), vec![1, 4]);
}

/// Cursors survive their string form.
#[test]
fn test_cursor_encoding() {
    let store = store_with(4);
    let page = items().cursor_paginate(&store, Some(2), None).unwrap();
    let cursor = page.next_cursor.unwrap();

    let encoded = cursor.encode();
    assert!(!encoded.contains('+') && !encoded.contains('/'));
    assert_eq!(Cursor::decode(&encoded).unwrap(), cursor);
    assert!(Cursor::decode("not a cursor").is_err());
}

// =============================================================================
// Identifier Tests
// =============================================================================

/// Generated identifiers parse back to themselves.
#[test]
fn test_identifier_round_trip() {
    for _ in 0..50 {
        let id = ObjectId::new();
        assert_eq!(ObjectId::parse(&id.to_string()).unwrap(), id);
    }
}
