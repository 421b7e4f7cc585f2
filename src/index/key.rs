//! Index keys and key extraction
//!
//! Keys are totally ordered: Null < Bool < numbers < String.
//! Int and Float compare exactly against each other, without rounding the
//! integer to f64.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::record::lookup_path;

/// A single segment of a composite key.
#[derive(Debug, Clone)]
pub enum IndexKey {
    /// Missing, null, or non-indexable value
    Null,
    /// Boolean value (false < true)
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
}

impl IndexKey {
    /// Create a key from a JSON value.
    ///
    /// Arrays and objects are not indexable and normalise to Null.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Bool(b) => IndexKey::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    IndexKey::Int(i)
                } else {
                    n.as_f64().map_or(IndexKey::Null, IndexKey::Float)
                }
            }
            Value::String(s) => IndexKey::String(s.clone()),
            Value::Null | Value::Array(_) | Value::Object(_) => IndexKey::Null,
        }
    }

    /// Create a key from an optional JSON value; None maps to Null
    pub fn from_optional(value: Option<&Value>) -> Self {
        value.map_or(IndexKey::Null, Self::from_json)
    }

    /// Converts a tuple of JSON values into keys
    pub fn tuple(values: &[Value]) -> Vec<IndexKey> {
        values.iter().map(Self::from_json).collect()
    }

    /// Converts the key back into JSON
    pub fn to_json(&self) -> Value {
        match self {
            IndexKey::Null => Value::Null,
            IndexKey::Bool(b) => Value::Bool(*b),
            IndexKey::Int(i) => Value::from(*i),
            IndexKey::Float(f) => Value::from(*f),
            IndexKey::String(s) => Value::String(s.clone()),
        }
    }

    /// Returns true for the Null key
    pub fn is_null(&self) -> bool {
        matches!(self, IndexKey::Null)
    }

    fn rank(&self) -> u8 {
        match self {
            IndexKey::Null => 0,
            IndexKey::Bool(_) => 1,
            IndexKey::Int(_) | IndexKey::Float(_) => 2,
            IndexKey::String(_) => 3,
        }
    }
}

impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (IndexKey::Null, IndexKey::Null) => Ordering::Equal,
            (IndexKey::Bool(a), IndexKey::Bool(b)) => a.cmp(b),
            (IndexKey::Int(a), IndexKey::Int(b)) => a.cmp(b),
            (IndexKey::Float(a), IndexKey::Float(b)) => {
                a.partial_cmp(b).unwrap_or_else(|| a.total_cmp(b))
            }
            (IndexKey::Int(a), IndexKey::Float(b)) => cmp_int_float(*a, *b),
            (IndexKey::Float(a), IndexKey::Int(b)) => cmp_int_float(*b, *a).reverse(),
            (IndexKey::String(a), IndexKey::String(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Orders an integer against a float without loss of precision
fn cmp_int_float(i: i64, f: f64) -> Ordering {
    // 2^63, the first float above i64::MAX
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;

    if f.is_nan() {
        return (i as f64).total_cmp(&f);
    }
    if f >= LIMIT {
        return Ordering::Less;
    }
    if f < -LIMIT {
        return Ordering::Greater;
    }

    let whole = f.trunc();
    match i.cmp(&(whole as i64)) {
        Ordering::Equal => whole.partial_cmp(&f).unwrap_or(Ordering::Equal),
        ordering => ordering,
    }
}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for IndexKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for IndexKey {}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl From<&Value> for IndexKey {
    fn from(value: &Value) -> Self {
        Self::from_json(value)
    }
}

impl From<i64> for IndexKey {
    fn from(value: i64) -> Self {
        IndexKey::Int(value)
    }
}

impl From<&str> for IndexKey {
    fn from(value: &str) -> Self {
        IndexKey::String(value.to_string())
    }
}

/// Derives a key value from a record's fields
pub type KeyFn = Arc<dyn Fn(&Map<String, Value>) -> Value + Send + Sync>;

/// Describes how one segment of a key tuple is read from a record.
#[derive(Clone)]
pub enum KeyExtractor {
    /// Value at a (possibly dotted) field path
    Field(String),
    /// Value computed from the whole record
    Function(KeyFn),
}

impl KeyExtractor {
    /// Extractor for a field path
    pub fn field(path: impl Into<String>) -> Self {
        KeyExtractor::Field(path.into())
    }

    /// Extractor backed by a function
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> Value + Send + Sync + 'static,
    {
        KeyExtractor::Function(Arc::new(f))
    }

    /// Evaluates the extractor against a record's fields
    pub fn extract(&self, fields: &Map<String, Value>) -> IndexKey {
        match self {
            KeyExtractor::Field(path) => IndexKey::from_optional(lookup_path(fields, path)),
            KeyExtractor::Function(f) => IndexKey::from_json(&f(fields)),
        }
    }

    /// Returns the field path, if this is a field extractor
    pub fn field_name(&self) -> Option<&str> {
        match self {
            KeyExtractor::Field(path) => Some(path),
            KeyExtractor::Function(_) => None,
        }
    }
}

impl fmt::Debug for KeyExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyExtractor::Field(path) => f.debug_tuple("Field").field(path).finish(),
            KeyExtractor::Function(_) => f.write_str("Function(..)"),
        }
    }
}

impl From<&str> for KeyExtractor {
    fn from(path: &str) -> Self {
        KeyExtractor::field(path)
    }
}

impl From<String> for KeyExtractor {
    fn from(path: String) -> Self {
        KeyExtractor::Field(path)
    }
}
