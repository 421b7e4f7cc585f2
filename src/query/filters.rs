//! Predicate filtering
//!
//! Clauses combine left to right: the first clause seeds the decision, and
//! each later clause ANDs with it, or ORs when marked with `|`.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use super::selection::{Clause, Operator};
use crate::record::lookup_path;

/// Evaluates clauses against record fields
pub struct PredicateFilter;

impl PredicateFilter {
    /// Checks if a record's fields satisfy the clause list.
    ///
    /// An empty clause list keeps every record.
    pub fn matches(fields: &Map<String, Value>, clauses: &[Clause]) -> bool {
        let mut keep = true;
        for (i, clause) in clauses.iter().enumerate() {
            let expr = Self::evaluate(lookup_path(fields, &clause.field), clause);
            keep = if i == 0 {
                expr
            } else if clause.or {
                keep || expr
            } else {
                keep && expr
            };
        }
        keep
    }

    /// Evaluates one clause against a field value (None when missing)
    pub fn evaluate(value: Option<&Value>, clause: &Clause) -> bool {
        let operand = &clause.operand;
        match clause.op {
            Operator::Eq => loose_eq(value.unwrap_or(&Value::Null), operand),
            Operator::Ne => !loose_eq(value.unwrap_or(&Value::Null), operand),
            Operator::StrictEq => value.is_some_and(|v| strict_eq(v, operand)),
            Operator::StrictNe => !value.is_some_and(|v| strict_eq(v, operand)),
            Operator::Gt => order(value, operand) == Some(Ordering::Greater),
            Operator::Gte => matches!(
                order(value, operand),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Operator::Lt => order(value, operand) == Some(Ordering::Less),
            Operator::Lte => matches!(
                order(value, operand),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Operator::In => value.is_some_and(|v| elements(operand).iter().any(|e| strict_eq(v, e))),
            Operator::NotIn => {
                !value.is_some_and(|v| elements(operand).iter().any(|e| strict_eq(v, e)))
            }
            Operator::IsectEmpty => !intersects(value, operand),
            Operator::IsectNotEmpty => intersects(value, operand),
            Operator::Contains => contains(value, operand),
            Operator::NotContains => !contains(value, operand),
            Operator::Like => like(value, clause),
            Operator::NotLike => !like(value, clause),
        }
    }
}

fn elements(value: &Value) -> &[Value] {
    match value {
        Value::Array(items) => items,
        _ => &[],
    }
}

/// Strict equality: same type and value; 1 and 1.0 are equal
fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(i), Some(j)) => i == j,
            _ => x.as_f64() == y.as_f64(),
        },
        _ => a == b,
    }
}

/// Loose equality: numbers, numeric strings and booleans coerce to numbers
fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Number(_) | Value::String(_) | Value::Bool(_), Value::Number(_) | Value::String(_) | Value::Bool(_)) => {
            match (as_number(a), as_number(b)) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            }
        }
        _ => strict_eq(a, b),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Some(0.0)
            } else {
                trimmed.parse().ok()
            }
        }
        _ => None,
    }
}

/// Orders two values of the same kind; mixed kinds are unordered
fn order(value: Option<&Value>, operand: &Value) -> Option<Ordering> {
    match (value?, operand) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
        },
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn intersects(value: Option<&Value>, operand: &Value) -> bool {
    let left = value.map(elements).unwrap_or_default();
    let right = elements(operand);
    left.iter().any(|a| right.iter().any(|b| strict_eq(a, b)))
}

fn contains(value: Option<&Value>, operand: &Value) -> bool {
    match (value, operand) {
        (Some(Value::Array(items)), _) => items.iter().any(|item| strict_eq(item, operand)),
        (Some(Value::String(haystack)), Value::String(needle)) => haystack.contains(needle.as_str()),
        _ => false,
    }
}

fn like(value: Option<&Value>, clause: &Clause) -> bool {
    let Some(pattern) = clause.pattern() else {
        return false;
    };
    match value {
        Some(Value::String(s)) => pattern.is_match(s),
        Some(v @ (Value::Number(_) | Value::Bool(_))) => pattern.is_match(&v.to_string()),
        _ => false,
    }
}
