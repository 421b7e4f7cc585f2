//! Collection Consistency Tests
//!
//! Tests for collection invariants:
//! - Every index holds exactly the records of the primary index
//! - Conflicting adds merge or replace in place
//! - Rejected adds leave every index untouched

use std::sync::{Arc, Mutex};

use memdex::collection::{
    AddOptions, Collection, CollectionConfig, CollectionError, CollectionEvent, ErrorKind,
    OnConflict, ADDED_INDEX,
};
use memdex::index::{IndexKey, IndexOptions, KeyExtractor, RangeOptions};
use memdex::query::QueryOptions;
use memdex::Record;
use serde_json::{json, Value};

// =============================================================================
// Helper Functions
// =============================================================================

fn make_collection() -> Collection {
    let mut collection = Collection::new(CollectionConfig::default());
    collection
        .create_index("status", None, IndexOptions::default())
        .unwrap();
    collection
        .create_index(
            "city",
            Some(vec![KeyExtractor::field("address.city")]),
            IndexOptions::default(),
        )
        .unwrap();
    collection
}

fn add(collection: &mut Collection, value: Value) -> Record {
    collection.add_one(value, &AddOptions::default()).unwrap()
}

fn sorted_ids(records: &[Record]) -> Vec<i64> {
    let mut ids: Vec<i64> = records
        .iter()
        .map(|r| r.get("id").and_then(|v| v.as_i64()).unwrap())
        .collect();
    ids.sort_unstable();
    ids
}

/// Asserts every index holds the same record set as the primary index.
fn assert_consistent(collection: &Collection) {
    let primary = sorted_ids(&collection.get_all(&[], &QueryOptions::default()).unwrap());
    let mut names: Vec<&str> = collection.index_names();
    names.push(ADDED_INDEX);
    for name in names {
        let records = collection
            .get_all(&[], &QueryOptions::index(name))
            .unwrap();
        assert_eq!(sorted_ids(&records), primary, "index {} diverged", name);
    }
}

// =============================================================================
// Conflict Resolution Tests
// =============================================================================

/// Merge keeps fields the incoming record lacks.
#[test]
fn test_merge_scenario() {
    let mut collection = make_collection();
    let record = add(&mut collection, json!({"id": 1, "a": 1, "b": 2}));
    add(&mut collection, json!({"id": 1, "a": 3}));
    assert_eq!(record.to_value(), json!({"id": 1, "a": 3, "b": 2}));
}

/// Replace drops fields the incoming record lacks.
#[test]
fn test_replace_scenario() {
    let mut collection =
        Collection::new(CollectionConfig::default().with_on_conflict(OnConflict::Replace));
    let record = add(&mut collection, json!({"id": 1, "a": 1, "b": 2}));
    add(&mut collection, json!({"id": 1, "a": 3}));
    assert_eq!(record.to_value(), json!({"id": 1, "a": 3}));

    // A per-call override beats the collection default
    collection
        .add_one(
            json!({"id": 1, "c": 4}),
            &AddOptions::default().on_conflict(OnConflict::Merge),
        )
        .unwrap();
    assert_eq!(record.to_value(), json!({"id": 1, "a": 3, "c": 4}));
}

/// Duplicate keys inside one batch resolve in order.
#[test]
fn test_duplicates_within_batch() {
    let mut collection = make_collection();
    let records = collection
        .add_many(
            vec![json!({"id": 1, "v": 1}), json!({"id": 1, "w": 2})],
            &AddOptions::default(),
        )
        .unwrap();

    assert_eq!(records.len(), 2);
    assert!(records[0].ptr_eq(&records[1]));
    assert_eq!(collection.len(), 1);
    assert_eq!(records[0].to_value(), json!({"id": 1, "v": 1, "w": 2}));
}

// =============================================================================
// Consistency Tests
// =============================================================================

/// Indexes agree after adds, conflicts and removals.
#[test]
fn test_indexes_agree_after_mutations() {
    let mut collection = make_collection();
    for id in 1..=20 {
        add(
            &mut collection,
            json!({
                "id": id,
                "status": if id % 2 == 0 { "even" } else { "odd" },
                "address": {"city": format!("c{}", id % 4)}
            }),
        );
    }
    assert_consistent(&collection);

    for id in (1..=20).step_by(3) {
        add(&mut collection, json!({"id": id, "status": "moved", "address": {"city": "x"}}));
    }
    assert_consistent(&collection);

    for id in (2..=20).step_by(5) {
        collection.remove(&IndexKey::Int(id));
    }
    assert_consistent(&collection);

    let moved = collection
        .get_all(&[vec![IndexKey::from("moved")]], &QueryOptions::index("status"))
        .unwrap();
    // 1 4 7 10 13 16 19, minus 7 (removed)
    assert_eq!(sorted_ids(&moved), vec![1, 4, 10, 13, 16, 19]);
}

/// A rejected batch leaves every index untouched.
#[test]
fn test_rejected_batch_is_atomic() {
    let mut collection = make_collection();
    add(&mut collection, json!({"id": 1, "status": "a"}));

    let err = collection
        .add(
            json!([{"id": 1, "status": "b"}, {"id": 2}, {"id": [3]}]),
            &AddOptions::default(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingKey);
    assert_eq!(
        err,
        CollectionError::MissingKey {
            field: "id".into(),
            found: "array".into(),
        }
    );

    assert_eq!(collection.len(), 1);
    let first = collection.get(&IndexKey::Int(1)).unwrap();
    assert_eq!(first.get("status"), Some(json!("a")));
    assert_consistent(&collection);

    let err = collection
        .add(json!([{"id": 4}, "nope"]), &AddOptions::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Usage);
    assert_eq!(collection.len(), 1);
}

/// Indexes created late are backfilled.
#[test]
fn test_late_index_backfill() {
    let mut collection = Collection::default();
    for id in 1..=5 {
        add(&mut collection, json!({"id": id, "score": 10 - id}));
    }
    collection
        .create_index("score", None, IndexOptions::default())
        .unwrap();

    let lowest = collection
        .query()
        .get(&[], &QueryOptions::index("score"))
        .unwrap()
        .limit(2)
        .unwrap()
        .run();
    assert_eq!(sorted_ids(&lowest), vec![4, 5]);
    assert_consistent(&collection);
}

/// Records sharing a key tuple are all held by the secondary index.
#[test]
fn test_shared_secondary_keys_keep_every_record() {
    let mut collection = Collection::default();
    collection
        .create_index("team", None, IndexOptions::default())
        .unwrap();
    collection
        .add_many(
            vec![
                json!({"id": 1, "age": 10, "team": "x"}),
                json!({"id": 2, "age": 20, "team": "x"}),
                json!({"id": 3, "age": 20, "team": "y"}),
            ],
            &AddOptions::default(),
        )
        .unwrap();

    let team_x = collection
        .get_all(&[vec![IndexKey::from("x")]], &QueryOptions::index("team"))
        .unwrap();
    assert_eq!(sorted_ids(&team_x), vec![1, 2]);
    assert_consistent(&collection);
}

/// Secondary indexes cannot swap out the id hash code.
#[test]
fn test_hash_code_override_rejected() {
    let mut collection = Collection::default();
    let err = collection
        .create_index(
            "age",
            None,
            IndexOptions::hash_code(KeyExtractor::field("team")),
        )
        .unwrap_err();
    assert_eq!(err.code(), "COLLECTION_HASH_CODE_OVERRIDE");
    assert!(err.is_usage());
    assert!(collection.index_names().is_empty());

    collection
        .add_many(
            vec![
                json!({"id": 1, "age": 10, "team": "x"}),
                json!({"id": 2, "age": 20, "team": "x"}),
            ],
            &AddOptions::default(),
        )
        .unwrap();
    collection
        .create_index("age", None, IndexOptions::default())
        .unwrap();
    assert_consistent(&collection);
}

/// Computed keys stay in step through merges and removals.
#[test]
fn test_function_index_agrees_after_mutations() {
    let mut collection = Collection::default();
    collection
        .create_index(
            "initial",
            Some(vec![KeyExtractor::function(|fields| {
                fields
                    .get("name")
                    .and_then(Value::as_str)
                    .and_then(|s| s.chars().next())
                    .map(|c| Value::String(c.to_uppercase().to_string()))
                    .unwrap_or(Value::Null)
            })]),
            IndexOptions::default(),
        )
        .unwrap();

    for (id, name) in [(1, "ann"), (2, "Abe"), (3, "bob"), (4, "cy")] {
        add(&mut collection, json!({"id": id, "name": name}));
    }
    assert_consistent(&collection);

    add(&mut collection, json!({"id": 3, "name": "al"}));
    add(&mut collection, json!({"id": 5}));
    collection.remove(&IndexKey::Int(1));
    assert_consistent(&collection);

    let a_names = collection
        .get_all(&[vec![IndexKey::from("A")]], &QueryOptions::index("initial"))
        .unwrap();
    assert_eq!(sorted_ids(&a_names), vec![2, 3]);

    let unnamed = collection
        .get_all(&[vec![IndexKey::Null]], &QueryOptions::index("initial"))
        .unwrap();
    assert_eq!(sorted_ids(&unnamed), vec![5]);
}

/// Inclusivity applies at the last level of a composite bound.
#[test]
fn test_composite_between_nested_inclusivity() {
    let mut collection = Collection::default();
    collection
        .create_index(
            "team_score",
            Some(vec![KeyExtractor::field("team"), KeyExtractor::field("score")]),
            IndexOptions::default(),
        )
        .unwrap();
    for (id, team, score) in [(1, "a", 1), (2, "a", 2), (3, "a", 3), (4, "b", 1), (5, "b", 2), (6, "c", 1)] {
        add(&mut collection, json!({"id": id, "team": team, "score": score}));
    }

    let opts = QueryOptions::index("team_score");
    let left = [IndexKey::from("a"), IndexKey::Int(2)];
    let right = [IndexKey::from("b"), IndexKey::Int(1)];
    let scan = |range: RangeOptions| {
        collection
            .between(&left, &right, &range, &opts)
            .unwrap()
            .iter()
            .map(|r| r.get("id").and_then(|v| v.as_i64()).unwrap())
            .collect::<Vec<_>>()
    };

    assert_eq!(scan(RangeOptions::default()), vec![2, 3]);
    assert_eq!(scan(RangeOptions::default().right_inclusive(true)), vec![2, 3, 4]);
    assert_eq!(
        scan(RangeOptions::default().left_inclusive(false).right_inclusive(true)),
        vec![3, 4]
    );
    assert_consistent(&collection);
}

/// String and numeric ids both key records; falsy ids are real keys.
#[test]
fn test_key_types() {
    let mut collection = Collection::default();
    add(&mut collection, json!({"id": 0}));
    add(&mut collection, json!({"id": ""}));
    add(&mut collection, json!({"id": "a"}));

    assert_eq!(collection.len(), 3);
    assert!(collection.get(&IndexKey::Int(0)).is_some());
    assert!(collection.get(&IndexKey::from("")).is_some());

    let err = collection
        .add_one(json!({"id": true}), &AddOptions::default())
        .unwrap_err();
    assert_eq!(err.code(), "COLLECTION_MISSING_KEY");
}

/// Surrogate keys are generated when allowed per call.
#[test]
fn test_auto_pk_per_call() {
    let mut collection = Collection::default();
    let records = collection
        .add_many(
            vec![json!({"name": "a"}), json!({"name": "b"})],
            &AddOptions::default().auto_pk(true),
        )
        .unwrap();

    assert_eq!(collection.auto_pk_records().len(), 2);
    assert_ne!(records[0].get("id"), records[1].get("id"));
    assert!(collection
        .add_one(json!({"name": "c"}), &AddOptions::default())
        .is_err());
}

// =============================================================================
// Event Tests
// =============================================================================

/// Subscribers see each mutation with the affected record.
#[test]
fn test_subscribers_receive_events() {
    let mut collection = make_collection();
    let log: Arc<Mutex<Vec<(String, Value)>>> = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&log);
    collection.subscribe(move |event: &CollectionEvent| {
        let id = event.record().get("id").unwrap_or(Value::Null);
        sink.lock().unwrap().push((event.event_type().to_string(), id));
    });

    add(&mut collection, json!({"id": 1, "status": "a"}));
    add(&mut collection, json!({"id": 2, "status": "b"}));
    collection.remove_all(&json!({"status": "a"})).unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            ("ADDED".to_string(), json!(1)),
            ("ADDED".to_string(), json!(2)),
            ("REMOVED".to_string(), json!(1)),
        ]
    );
}
