//! Shared record handles
//!
//! A record is a JSON object owned by a collection and referenced by every
//! index it appears in. Indexes hold handles, never copies.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::{Map, Value};

/// Handle to a single record.
///
/// Cloning the handle aliases the same underlying record.
#[derive(Clone, Default)]
pub struct Record(Arc<RwLock<Map<String, Value>>>);

impl Record {
    /// Wraps a field map in a new record
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(Arc::new(RwLock::new(fields)))
    }

    /// Creates a record from a JSON value.
    ///
    /// Returns None unless the value is an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self::new(fields)),
            _ => None,
        }
    }

    /// Returns the value at a dotted path, if present
    pub fn get(&self, path: &str) -> Option<Value> {
        lookup_path(&self.fields(), path).cloned()
    }

    /// Sets a top-level field, returning the previous value.
    ///
    /// Index positions are not updated; callers owning the record in a
    /// collection must call `Collection::update_indexes` afterwards.
    pub fn set(&self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.fields_mut().insert(field.into(), value)
    }

    /// Removes a top-level field
    pub fn unset(&self, field: &str) -> Option<Value> {
        self.fields_mut().shift_remove(field)
    }

    /// Returns a detached copy of the record as a JSON object
    pub fn to_value(&self) -> Value {
        Value::Object(self.fields().clone())
    }

    /// Returns true if both handles point at the same record
    pub fn ptr_eq(&self, other: &Record) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn fields(&self) -> RwLockReadGuard<'_, Map<String, Value>> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn fields_mut(&self) -> RwLockWriteGuard<'_, Map<String, Value>> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Record").field(&*self.fields()).finish()
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Self::new(fields)
    }
}

/// Resolves a dotted path (`"a.b.0"`) against a field map.
///
/// Segments descend through objects by key and through arrays by position.
pub(crate) fn lookup_path<'a>(fields: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = fields.get(first)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}
