//! Result sorting
//!
//! Multi-key, stable sort. String keys compare case-insensitively.

use std::cmp::Ordering;

use serde_json::Value;

use super::selection::{SortDirection, SortSpec};
use crate::record::{lookup_path, Record};

static NULL: Value = Value::Null;

/// Sorts query results
pub struct ResultSorter;

impl ResultSorter {
    /// Sorts records by each sort key in turn; ties keep their input order.
    pub fn sort(records: &mut Vec<Record>, specs: &[SortSpec]) {
        if specs.is_empty() || records.len() < 2 {
            return;
        }

        // Keys are extracted once so the comparator never takes record locks
        let mut keyed: Vec<(Vec<Option<Value>>, Record)> = records
            .drain(..)
            .map(|record| {
                let keys = {
                    let fields = record.fields();
                    specs
                        .iter()
                        .map(|spec| lookup_path(&fields, &spec.field).map(sort_key))
                        .collect()
                };
                (keys, record)
            })
            .collect();

        keyed.sort_by(|(a, _), (b, _)| {
            for (i, spec) in specs.iter().enumerate() {
                let ordering = Self::compare_values(a[i].as_ref(), b[i].as_ref());
                let ordering = match spec.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });

        records.extend(keyed.into_iter().map(|(_, record)| record));
    }

    /// Compares two values for sorting.
    ///
    /// Ordering rules:
    /// - missing = null < bool < number < string < array < object
    /// - For same types, natural ordering
    pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
        let a = a.unwrap_or(&NULL);
        let b = b.unwrap_or(&NULL);

        let rank = type_rank(a).cmp(&type_rank(b));
        if rank != Ordering::Equal {
            return rank;
        }

        match (a, b) {
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
                (Some(i), Some(j)) => i.cmp(&j),
                _ => {
                    let x = x.as_f64().unwrap_or(0.0);
                    let y = y.as_f64().unwrap_or(0.0);
                    x.partial_cmp(&y).unwrap_or(Ordering::Equal)
                }
            },
            (Value::String(x), Value::String(y)) => x.cmp(y),
            // Arrays and objects are not compared
            _ => Ordering::Equal,
        }
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn sort_key(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.to_uppercase()),
        other => other.clone(),
    }
}
