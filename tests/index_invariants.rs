//! Sorted Index Invariant Tests
//!
//! Tests for index invariants:
//! - Traversal yields non-decreasing key tuples
//! - A record appears at most once
//! - Insert then remove leaves the index as it was
//! - Range scans honour bounds, inclusivity and pagination

use memdex::index::{IndexKey, IndexOptions, KeyExtractor, RangeOptions, SortedIndex};
use memdex::Record;
use proptest::prelude::*;
use serde_json::{json, Value};

// =============================================================================
// Helper Functions
// =============================================================================

fn make_record(value: Value) -> Record {
    Record::from_value(value).unwrap()
}

fn ids(records: &[Record]) -> Vec<i64> {
    records
        .iter()
        .map(|r| r.get("id").and_then(|v| v.as_i64()).unwrap())
        .collect()
}

fn make_numbers(n: i64) -> SortedIndex {
    let mut index = SortedIndex::on_fields(&["id"]).unwrap();
    for id in 1..=n {
        index.insert_record(&make_record(json!({ "id": id })));
    }
    index
}

fn assert_sorted(index: &SortedIndex) {
    let tuples: Vec<Vec<IndexKey>> = index.visit_all().map(|r| index.key_tuple(r)).collect();
    for pair in tuples.windows(2) {
        assert!(pair[0] <= pair[1], "{:?} after {:?}", pair[1], pair[0]);
    }
}

// =============================================================================
// Range Tests
// =============================================================================

/// Default range is left-inclusive, right-exclusive.
#[test]
fn test_between_default_bounds() {
    let index = make_numbers(100);
    let result = index
        .between(&[IndexKey::Int(25)], &[IndexKey::Int(75)], &RangeOptions::default())
        .unwrap();
    assert_eq!(ids(&result), (25..=74).collect::<Vec<_>>());
}

/// Offset and limit page through the range.
#[test]
fn test_between_pagination() {
    let index = make_numbers(100);
    let result = index
        .between(
            &[IndexKey::Int(25)],
            &[IndexKey::Int(75)],
            &RangeOptions::default().limit(10).offset(5),
        )
        .unwrap();
    assert_eq!(ids(&result), (30..=39).collect::<Vec<_>>());
}

/// Inclusivity flags flip each boundary.
#[test]
fn test_between_inclusivity() {
    let index = make_numbers(10);
    let opts = RangeOptions::default()
        .left_inclusive(false)
        .right_inclusive(true);
    let result = index
        .between(&[IndexKey::Int(3)], &[IndexKey::Int(6)], &opts)
        .unwrap();
    assert_eq!(ids(&result), vec![4, 5, 6]);
}

/// Empty bounds are open.
#[test]
fn test_between_open_bounds() {
    let index = make_numbers(5);
    let all = index.between(&[], &[], &RangeOptions::default()).unwrap();
    assert_eq!(ids(&all), vec![1, 2, 3, 4, 5]);

    let tail = index
        .between(&[IndexKey::Int(4)], &[], &RangeOptions::default())
        .unwrap();
    assert_eq!(ids(&tail), vec![4, 5]);
}

/// A limit of zero returns nothing.
#[test]
fn test_between_zero_limit() {
    let index = make_numbers(5);
    let result = index
        .between(&[], &[], &RangeOptions::default().limit(0))
        .unwrap();
    assert!(result.is_empty());
}

/// Operator-object ranges behave like between.
#[test]
fn test_operator_range_query() {
    let index = make_numbers(20);
    let result = index
        .query(&json!({">": [5], "<=": [8]}))
        .unwrap();
    assert_eq!(ids(&result), vec![6, 7, 8]);

    assert!(index.query(&json!({"~": 1})).is_err());
}

// =============================================================================
// Composite Index Tests
// =============================================================================

/// Prefix lookups on a two-field index.
#[test]
fn test_composite_prefix_lookup() {
    let mut index = SortedIndex::on_fields(&["last", "first"]).unwrap();
    let people = [
        (1, "smith", "john"),
        (2, "jones", "amy"),
        (3, "smith", "anna"),
        (4, "smith", "john"),
    ];
    for (id, last, first) in people {
        index.insert_record(&make_record(json!({"id": id, "last": last, "first": first})));
    }

    let smiths = index.get(&[IndexKey::from("smith")]).unwrap();
    assert_eq!(ids(&smiths), vec![3, 1, 4]);

    let johns = index
        .get(&[IndexKey::from("smith"), IndexKey::from("john")])
        .unwrap();
    assert_eq!(ids(&johns), vec![1, 4]);

    assert!(index
        .get(&[IndexKey::from("smith"), IndexKey::from("john"), IndexKey::Null])
        .is_err());
    assert_sorted(&index);
}

/// Missing fields, arrays and objects all index under null, which sorts first.
#[test]
fn test_null_keys_sort_first() {
    let mut index = SortedIndex::on_fields(&["v"]).unwrap();
    index.insert_record(&make_record(json!({"id": 1, "v": "a"})));
    index.insert_record(&make_record(json!({"id": 2})));
    index.insert_record(&make_record(json!({"id": 3, "v": [1, 2]})));
    index.insert_record(&make_record(json!({"id": 4, "v": 0})));
    index.insert_record(&make_record(json!({"id": 5, "v": false})));

    assert_eq!(ids(&index.get_all()), vec![2, 3, 5, 4, 1]);
    assert_eq!(ids(&index.peek()), vec![2, 3]);
}

/// Function extractors compute keys from the whole record.
#[test]
fn test_function_extractor() {
    let upper = KeyExtractor::function(|fields| {
        fields
            .get("name")
            .and_then(|v| v.as_str())
            .map(|s| Value::String(s.to_uppercase()))
            .unwrap_or(Value::Null)
    });
    let mut index = SortedIndex::new(vec![upper], IndexOptions::default()).unwrap();
    index.insert_record(&make_record(json!({"id": 1, "name": "bob"})));
    index.insert_record(&make_record(json!({"id": 2, "name": "Bob"})));

    assert_eq!(ids(&index.get(&[IndexKey::from("BOB")]).unwrap()), vec![1, 2]);
}

// =============================================================================
// Mutation Tests
// =============================================================================

/// A record inserted twice appears once.
#[test]
fn test_idempotent_insert() {
    let mut index = SortedIndex::on_fields(&["group"]).unwrap();
    let record = make_record(json!({"id": 1, "group": "a"}));
    assert!(index.insert_record(&record));
    assert!(!index.insert_record(&record));
    assert_eq!(index.len(), 1);
    assert_eq!(index.visit_all().count(), 1);
}

/// Records mutated in place are still removable and re-positionable.
#[test]
fn test_remove_after_in_place_mutation() {
    let mut index = SortedIndex::on_fields(&["rank"]).unwrap();
    let record = make_record(json!({"id": 1, "rank": 10}));
    index.insert_record(&record);

    record.set("rank", json!(20));
    index.update_record(&record);
    assert!(index.get(&[IndexKey::Int(10)]).unwrap().is_empty());
    assert_eq!(index.key_path(&record), Some(&[IndexKey::Int(20)][..]));

    record.set("rank", json!(30));
    assert!(index.remove_record(&record).is_some());
    assert!(index.is_empty());
    assert_eq!(index.key_count(), 0);
}

// =============================================================================
// Properties
// =============================================================================

#[derive(Debug, Clone)]
enum Op {
    Insert(i64, i64, i64),
    Remove(i64),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..40i64, 0..5i64, 0..5i64).prop_map(|(id, a, b)| Op::Insert(id, a, b)),
        (0..40i64).prop_map(Op::Remove),
    ]
}

proptest! {
    #[test]
    fn prop_traversal_stays_sorted(ops in prop::collection::vec(arb_op(), 0..120)) {
        let mut index = SortedIndex::on_fields(&["a", "b"]).unwrap();
        // Ids repeat across key tuples; each handle is tracked separately
        let mut live: std::collections::BTreeMap<i64, Vec<Record>> = Default::default();

        for op in ops {
            match op {
                Op::Insert(id, a, b) => {
                    let record = make_record(json!({"id": id, "a": a, "b": b}));
                    if index.insert_record(&record) {
                        live.entry(id).or_default().push(record);
                    }
                }
                Op::Remove(id) => {
                    for record in live.remove(&id).unwrap_or_default() {
                        prop_assert!(index.remove_record(&record).is_some());
                    }
                }
            }
        }
        let live_count: usize = live.values().map(Vec::len).sum();

        let tuples: Vec<Vec<IndexKey>> = index.visit_all().map(|r| index.key_tuple(r)).collect();
        for pair in tuples.windows(2) {
            prop_assert!(pair[0] <= pair[1]);
        }
        prop_assert_eq!(index.len(), live_count);
        prop_assert_eq!(tuples.len(), live_count);
    }

    #[test]
    fn prop_insert_remove_round_trip(
        seed in prop::collection::vec((0..5i64, 0..5i64), 1..30),
        extra in (0..5i64, 0..5i64),
    ) {
        let mut index = SortedIndex::on_fields(&["a", "b"]).unwrap();
        for (id, (a, b)) in seed.iter().enumerate() {
            index.insert_record(&make_record(json!({"id": id, "a": a, "b": b})));
        }
        let before = ids(&index.get_all());
        let before_keys = index.key_count();

        let record = make_record(json!({"id": 1000, "a": extra.0, "b": extra.1}));
        prop_assert!(index.insert_record(&record));
        prop_assert!(index.remove_record(&record).is_some());

        prop_assert_eq!(ids(&index.get_all()), before);
        prop_assert_eq!(index.key_count(), before_keys);
        prop_assert!(index.key_path(&record).is_none());
    }
}
