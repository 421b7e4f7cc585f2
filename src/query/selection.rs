//! Declarative selections
//!
//! A selection is a list of field clauses plus ordering and pagination.
//! It is parsed and validated up front, so a malformed selection is rejected
//! before any record is examined.
//!
//! ```text
//! {
//!   "where": { "age": { ">=": 18, "|==": null }, "status": { "in": ["a", "b"] } },
//!   "name": "ann",                 // shorthand for name == "ann"
//!   "orderBy": [["age", "DESC"], "name"],
//!   "skip": 10,
//!   "limit": 5
//! }
//! ```

use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};

use super::errors::{QueryError, QueryResult};

/// Top-level keys that are never field filters
pub const RESERVED_KEYS: [&str; 6] = ["skip", "offset", "where", "limit", "orderBy", "sort"];

/// Filter operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `==` loose equality
    Eq,
    /// `===` strict equality
    StrictEq,
    /// `!=` loose inequality
    Ne,
    /// `!==` strict inequality
    StrictNe,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Value is one of the operand's elements
    In,
    NotIn,
    /// Value array shares no element with the operand
    IsectEmpty,
    IsectNotEmpty,
    /// Value array (or string) contains the operand
    Contains,
    NotContains,
    /// `%`/`_` pattern match
    Like,
    NotLike,
}

impl Operator {
    /// Returns the operator's symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::StrictEq => "===",
            Operator::Ne => "!=",
            Operator::StrictNe => "!==",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::In => "in",
            Operator::NotIn => "notIn",
            Operator::IsectEmpty => "isectEmpty",
            Operator::IsectNotEmpty => "isectNotEmpty",
            Operator::Contains => "contains",
            Operator::NotContains => "notContains",
            Operator::Like => "like",
            Operator::NotLike => "notLike",
        }
    }

    /// Parses an operator symbol, returning the operator and any pattern flags.
    ///
    /// `likei` and `notLikei` carry the `i` flag.
    fn parse(symbol: &str) -> QueryResult<(Operator, &str)> {
        let op = match symbol {
            "==" => Operator::Eq,
            "===" => Operator::StrictEq,
            "!=" => Operator::Ne,
            "!==" => Operator::StrictNe,
            ">" => Operator::Gt,
            ">=" => Operator::Gte,
            "<" => Operator::Lt,
            "<=" => Operator::Lte,
            "in" => Operator::In,
            "notIn" => Operator::NotIn,
            "isectEmpty" => Operator::IsectEmpty,
            "isectNotEmpty" => Operator::IsectNotEmpty,
            "contains" => Operator::Contains,
            "notContains" => Operator::NotContains,
            _ => {
                if let Some(flags) = symbol.strip_prefix("notLike") {
                    return Ok((Operator::NotLike, flags));
                }
                if let Some(flags) = symbol.strip_prefix("like") {
                    return Ok((Operator::Like, flags));
                }
                return Err(QueryError::UnknownOperator(symbol.to_string()));
            }
        };
        Ok((op, ""))
    }
}

/// A single field test
#[derive(Debug, Clone)]
pub struct Clause {
    /// Field path
    pub field: String,
    /// Operator
    pub op: Operator,
    /// Right-hand operand
    pub operand: Value,
    /// OR with the clauses before it instead of AND
    pub or: bool,
    pattern: Option<Regex>,
}

impl Clause {
    /// Builds a clause from an operator key such as `">="`, `"|in"` or `"likei"`.
    pub fn parse(field: impl Into<String>, key: &str, operand: Value) -> QueryResult<Self> {
        let (or, symbol) = match key.strip_prefix('|') {
            Some(rest) => (true, rest),
            None => (false, key),
        };
        let (op, flags) = Operator::parse(symbol)?;
        Self::build(field.into(), op, flags, operand, or)
    }

    /// Builds a clause from a typed operator
    pub fn new(field: impl Into<String>, op: Operator, operand: Value) -> QueryResult<Self> {
        Self::build(field.into(), op, "", operand, false)
    }

    fn build(field: String, op: Operator, flags: &str, operand: Value, or: bool) -> QueryResult<Self> {
        let pattern = match op {
            Operator::Like | Operator::NotLike => Some(like_pattern(&operand, flags)?),
            Operator::In | Operator::NotIn if !operand.is_array() => {
                return Err(QueryError::invalid_argument(format!(
                    "{}: operand must be an array",
                    op.symbol()
                )));
            }
            _ => None,
        };

        Ok(Self {
            field,
            op,
            operand,
            or,
            pattern,
        })
    }

    /// Marks the clause as OR-combined
    pub fn or(mut self) -> Self {
        self.or = true;
        self
    }

    pub(crate) fn pattern(&self) -> Option<&Regex> {
        self.pattern.as_ref()
    }
}

/// Compiles a like pattern: `%` matches any run, `_` exactly one character.
fn like_pattern(operand: &Value, flags: &str) -> QueryResult<Regex> {
    let Some(pattern) = operand.as_str() else {
        return Err(QueryError::invalid_argument("like: pattern must be a string"));
    };

    let mut case_insensitive = false;
    for flag in flags.chars() {
        match flag {
            'i' => case_insensitive = true,
            'g' | 'm' | 'u' | 'y' | 's' => {}
            other => {
                return Err(QueryError::InvalidPattern(format!(
                    "unsupported flag '{}'",
                    other
                )))
            }
        }
    }

    let body = regex::escape(pattern).replace('%', ".*").replace('_', ".");
    RegexBuilder::new(&format!("^{}$", body))
        .case_insensitive(case_insensitive)
        .dot_matches_new_line(true)
        .build()
        .map_err(|e| QueryError::InvalidPattern(e.to_string()))
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// One sort key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    /// Field path to sort by
    pub field: String,
    /// Direction
    pub direction: SortDirection,
}

impl SortSpec {
    /// Ascending sort on a field
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    /// Descending sort on a field
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Clauses plus ordering and pagination
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub clauses: Vec<Clause>,
    pub order_by: Vec<SortSpec>,
    pub skip: Option<usize>,
    pub limit: Option<usize>,
}

impl Selection {
    /// Creates an empty selection, which keeps every record
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a clause from an operator key
    pub fn clause(mut self, field: impl Into<String>, key: &str, operand: Value) -> QueryResult<Self> {
        self.clauses.push(Clause::parse(field, key, operand)?);
        Ok(self)
    }

    /// Adds a loose equality clause
    pub fn eq(mut self, field: impl Into<String>, operand: Value) -> Self {
        self.clauses.push(Clause {
            field: field.into(),
            op: Operator::Eq,
            operand,
            or: false,
            pattern: None,
        });
        self
    }

    pub fn order_by(mut self, spec: SortSpec) -> Self {
        self.order_by.push(spec);
        self
    }

    pub fn skip(mut self, n: usize) -> Self {
        self.skip = Some(n);
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Parses a JSON selection object. `null` selects everything.
    pub fn from_json(criteria: &Value) -> QueryResult<Self> {
        let map = match criteria {
            Value::Object(map) => map,
            Value::Null => return Ok(Self::default()),
            other => {
                return Err(QueryError::invalid_argument(format!(
                    "criteria: Expected object but found {}",
                    type_name(other)
                )))
            }
        };

        let empty = Map::new();
        let where_map = match map.get("where") {
            Some(Value::Object(w)) => w,
            None | Some(Value::Null) => &empty,
            Some(other) => {
                return Err(QueryError::invalid_argument(format!(
                    "where: Expected object but found {}",
                    type_name(other)
                )))
            }
        };

        let mut selection = Self::default();

        for (field, clause) in where_map {
            match clause {
                Value::Object(ops) => {
                    for (key, operand) in ops {
                        selection.clauses.push(Clause::parse(field, key, operand.clone())?);
                    }
                }
                value => selection = selection.eq(field, value.clone()),
            }
        }

        for (key, value) in map {
            if RESERVED_KEYS.contains(&key.as_str()) || where_map.contains_key(key) {
                continue;
            }
            selection = selection.eq(key, value.clone());
        }

        let order_by = match map.get("orderBy") {
            Some(value) if !value.is_null() => Some(value),
            _ => map.get("sort"),
        };
        if let Some(order_by) = order_by {
            selection.order_by = parse_order_by(order_by)?;
        }

        selection.skip = match count(map, "skip")? {
            Some(n) => Some(n),
            None => count(map, "offset")?,
        };
        selection.limit = count(map, "limit")?;

        Ok(selection)
    }
}

fn parse_order_by(value: &Value) -> QueryResult<Vec<SortSpec>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(field) => Ok(vec![SortSpec::asc(field.as_str())]),
        Value::Array(defs) => defs.iter().map(parse_sort_def).collect(),
        other => Err(QueryError::invalid_argument(format!(
            "orderBy: Expected string or array but found {}",
            type_name(other)
        ))),
    }
}

fn parse_sort_def(def: &Value) -> QueryResult<SortSpec> {
    match def {
        Value::String(field) => Ok(SortSpec::asc(field.as_str())),
        Value::Array(pair) => {
            let field = pair
                .first()
                .and_then(Value::as_str)
                .ok_or_else(|| QueryError::invalid_argument("orderBy: missing field name"))?;
            match pair.get(1).and_then(Value::as_str) {
                None => Ok(SortSpec::asc(field)),
                Some(dir) if dir.eq_ignore_ascii_case("ASC") => Ok(SortSpec::asc(field)),
                Some(dir) if dir.eq_ignore_ascii_case("DESC") => Ok(SortSpec::desc(field)),
                Some(dir) => Err(QueryError::invalid_argument(format!(
                    "orderBy: unknown direction '{}'",
                    dir
                ))),
            }
        }
        other => Err(QueryError::invalid_argument(format!(
            "orderBy: Expected string or [field, direction] but found {}",
            type_name(other)
        ))),
    }
}

fn count(map: &Map<String, Value>, key: &str) -> QueryResult<Option<usize>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| {
                QueryError::invalid_argument(format!(
                    "{}: Expected non-negative integer but found {}",
                    key,
                    type_name(value)
                ))
            }),
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
