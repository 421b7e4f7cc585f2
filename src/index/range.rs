//! Range scan options and operator-object ranges

use serde_json::Value;

use super::errors::{IndexError, IndexResult};
use super::key::IndexKey;

/// Boundary and pagination rules for a range scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeOptions {
    /// Include records on the left boundary (default: true)
    pub left_inclusive: bool,
    /// Include records on the right boundary (default: false)
    pub right_inclusive: bool,
    /// Maximum number of records to return
    pub limit: Option<usize>,
    /// Number of leading records to skip
    pub offset: usize,
}

impl Default for RangeOptions {
    fn default() -> Self {
        Self {
            left_inclusive: true,
            right_inclusive: false,
            limit: None,
            offset: 0,
        }
    }
}

impl RangeOptions {
    pub fn left_inclusive(mut self, inclusive: bool) -> Self {
        self.left_inclusive = inclusive;
        self
    }

    pub fn right_inclusive(mut self, inclusive: bool) -> Self {
        self.right_inclusive = inclusive;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Number of records a scan must gather before slicing
    pub(crate) fn cap(&self) -> Option<usize> {
        self.limit.map(|limit| limit.saturating_add(self.offset))
    }
}

/// A range expressed with comparison operators.
///
/// `{">=": [18], "<": [30], "limit": 10}`. A missing side is open.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeQuery {
    pub left: Vec<IndexKey>,
    pub right: Vec<IndexKey>,
    pub options: RangeOptions,
}

impl RangeQuery {
    /// Parses an operator object
    pub fn from_json(spec: &Value) -> IndexResult<Self> {
        let Value::Object(entries) = spec else {
            return Err(IndexError::malformed_range("expected an object"));
        };

        let mut query = RangeQuery {
            left: Vec::new(),
            right: Vec::new(),
            options: RangeOptions::default(),
        };
        let mut has_left = false;
        let mut has_right = false;

        for (op, operand) in entries {
            match op.as_str() {
                ">" | ">=" => {
                    if has_left {
                        return Err(IndexError::malformed_range("more than one left bound"));
                    }
                    has_left = true;
                    query.left = bound_tuple(operand);
                    query.options.left_inclusive = op == ">=";
                }
                "<" | "<=" => {
                    if has_right {
                        return Err(IndexError::malformed_range("more than one right bound"));
                    }
                    has_right = true;
                    query.right = bound_tuple(operand);
                    query.options.right_inclusive = op == "<=";
                }
                "limit" => query.options.limit = Some(count(op, operand)?),
                "offset" => query.options.offset = count(op, operand)?,
                other => {
                    return Err(IndexError::malformed_range(format!(
                        "unknown key '{}'",
                        other
                    )))
                }
            }
        }

        Ok(query)
    }
}

fn bound_tuple(operand: &Value) -> Vec<IndexKey> {
    match operand {
        Value::Array(values) => IndexKey::tuple(values),
        scalar => vec![IndexKey::from_json(scalar)],
    }
}

fn count(name: &str, operand: &Value) -> IndexResult<usize> {
    operand
        .as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| {
            IndexError::malformed_range(format!("{} must be a non-negative integer", name))
        })
}
