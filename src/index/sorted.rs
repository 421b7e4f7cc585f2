//! Composite sorted index
//!
//! # API
//!
//! - `insert_record(record)` - Index a record under its key tuple
//! - `remove_record(record)` - Remove a record, pruning empty nodes
//! - `update_record(record)` - Re-position a record after mutation
//! - `get(keys)` - Exact or prefix lookup
//! - `between(left, right, opts)` - Ordered range scan
//! - `visit_all()` - Lazy key-ordered traversal
//!
//! # Invariants
//!
//! - A record handle appears at most once
//! - Hash codes are unique within a leaf, not across the index
//! - Traversal yields non-decreasing key tuples
//! - Removal uses the key path recorded at insertion, so records mutated in
//!   place are still found

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::trace;

use super::errors::{IndexError, IndexResult};
use super::key::{IndexKey, KeyExtractor};
use super::node::{Node, Records, Slot};
use super::range::{RangeOptions, RangeQuery};
use crate::record::Record;

/// Default tie-break field for leaf ordering
pub const DEFAULT_HASH_FIELD: &str = "id";

/// Options for building an index
#[derive(Debug, Clone, Default)]
pub struct IndexOptions {
    /// Orders and identifies records within a leaf (default: `id` field)
    pub hash_code: Option<KeyExtractor>,
}

impl IndexOptions {
    pub fn hash_code(extractor: impl Into<KeyExtractor>) -> Self {
        Self {
            hash_code: Some(extractor.into()),
        }
    }
}

/// Where one indexed record is stored
#[derive(Debug, Clone)]
struct Location {
    path: Vec<IndexKey>,
    record: Record,
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.record.ptr_eq(&other.record)
    }
}

/// A sorted index over an ordered field list.
#[derive(Debug, Clone)]
pub struct SortedIndex {
    fields: Vec<KeyExtractor>,
    hash_code: KeyExtractor,
    root: Node,
    /// Hash code -> every record with that hash and its key path
    locations: BTreeMap<IndexKey, Vec<Location>>,
    len: usize,
}

impl SortedIndex {
    /// Creates an empty index over `fields`.
    ///
    /// Fails if the field list is empty or names an empty path segment.
    pub fn new(fields: Vec<KeyExtractor>, options: IndexOptions) -> IndexResult<Self> {
        if fields.is_empty() {
            return Err(IndexError::malformed_field_list("field list is empty"));
        }
        for field in &fields {
            validate_extractor(field)?;
        }

        let hash_code = options
            .hash_code
            .unwrap_or_else(|| KeyExtractor::field(DEFAULT_HASH_FIELD));
        validate_extractor(&hash_code)?;

        Ok(Self::from_parts(fields, hash_code))
    }

    /// Builds an index from extractors already known to be well formed
    pub(crate) fn from_parts(fields: Vec<KeyExtractor>, hash_code: KeyExtractor) -> Self {
        Self {
            fields,
            hash_code,
            root: Node::default(),
            locations: BTreeMap::new(),
            len: 0,
        }
    }

    /// Shorthand for an index over named fields with default options
    pub fn on_fields(fields: &[&str]) -> IndexResult<Self> {
        Self::new(
            fields.iter().map(|f| KeyExtractor::field(*f)).collect(),
            IndexOptions::default(),
        )
    }

    /// Returns the field list
    pub fn fields(&self) -> &[KeyExtractor] {
        &self.fields
    }

    /// Evaluates the field list against a record
    pub fn key_tuple(&self, record: &Record) -> Vec<IndexKey> {
        let fields = record.fields();
        self.tuple_of(&fields)
    }

    fn tuple_of(&self, fields: &Map<String, Value>) -> Vec<IndexKey> {
        self.fields.iter().map(|f| f.extract(fields)).collect()
    }

    /// Evaluates the tie-break key for a record
    pub fn hash_of(&self, record: &Record) -> IndexKey {
        self.hash_code.extract(&record.fields())
    }

    /// Indexes a record under its current key tuple.
    ///
    /// Returns false (and does nothing) if the record is already indexed, or
    /// if its leaf already holds a record with the same hash code.
    pub fn insert_record(&mut self, record: &Record) -> bool {
        let path = self.key_tuple(record);
        self.insert_at(path, record)
    }

    /// Indexes a record under an explicit key tuple.
    ///
    /// The tuple must have one key per field.
    pub fn set(&mut self, keys: Vec<IndexKey>, record: &Record) -> IndexResult<bool> {
        if keys.len() != self.fields.len() {
            return Err(IndexError::KeyArity {
                given: keys.len(),
                fields: self.fields.len(),
            });
        }
        Ok(self.insert_at(keys, record))
    }

    /// Indexes a record under `path`, which must have one key per field
    pub(crate) fn insert_at(&mut self, path: Vec<IndexKey>, record: &Record) -> bool {
        let hash = self.hash_of(record);
        if self.location_of(&hash, record).is_some() {
            return false;
        }
        let inserted = self.root.set(
            &path,
            Slot {
                hash: hash.clone(),
                record: record.clone(),
            },
        );
        if inserted {
            self.locations.entry(hash).or_default().push(Location {
                path,
                record: record.clone(),
            });
            self.len += 1;
        }
        inserted
    }

    /// Removes a record, pruning any node left empty.
    ///
    /// `record` must be the handle that was indexed. Returns the removed
    /// handle, or None if the record was not indexed.
    pub fn remove_record(&mut self, record: &Record) -> Option<Record> {
        let hash = self.hash_of(record);
        let entries = self.locations.get_mut(&hash)?;
        let pos = entries.iter().position(|l| l.record.ptr_eq(record))?;
        let location = entries.remove(pos);
        if entries.is_empty() {
            self.locations.remove(&hash);
        }

        let removed = self.root.remove(&location.path, &hash);
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    fn location_of(&self, hash: &IndexKey, record: &Record) -> Option<&Location> {
        self.locations
            .get(hash)?
            .iter()
            .find(|l| l.record.ptr_eq(record))
    }

    /// Re-positions a record whose key fields may have changed
    pub fn update_record(&mut self, record: &Record) {
        self.remove_record(record);
        self.insert_record(record);
    }

    /// Exact lookup, or prefix lookup when fewer keys than fields are given.
    pub fn get(&self, keys: &[IndexKey]) -> IndexResult<Vec<Record>> {
        self.check_arity(keys)?;
        Ok(self.root.get(keys))
    }

    /// Every record, in key order
    pub fn get_all(&self) -> Vec<Record> {
        self.visit_all().cloned().collect()
    }

    /// Lazy key-ordered traversal of every record
    pub fn visit_all(&self) -> Records<'_> {
        self.root.records()
    }

    /// Records whose key tuple lies between `left` and `right`.
    ///
    /// Bounds may be shorter than the field list; an empty bound is open.
    pub fn between(
        &self,
        left: &[IndexKey],
        right: &[IndexKey],
        opts: &RangeOptions,
    ) -> IndexResult<Vec<Record>> {
        self.check_arity(left)?;
        self.check_arity(right)?;

        if opts.limit == Some(0) {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        self.root.between(left, right, opts, opts.cap(), &mut out);
        trace!(
            target: "memdex::index",
            scanned = out.len(),
            offset = opts.offset,
            limit = ?opts.limit,
            "range scan"
        );

        let limit = opts.limit.unwrap_or(usize::MAX);
        Ok(out.into_iter().skip(opts.offset).take(limit).collect())
    }

    /// Range scan from an operator object such as `{">=": [18], "<": [30]}`
    pub fn query(&self, spec: &Value) -> IndexResult<Vec<Record>> {
        let range = RangeQuery::from_json(spec)?;
        self.between(&range.left, &range.right, &range.options)
    }

    /// Records of the left-most leaf
    pub fn peek(&self) -> Vec<Record> {
        self.root.peek()
    }

    /// Key path under which `record` was indexed
    pub fn key_path(&self, record: &Record) -> Option<&[IndexKey]> {
        let hash = self.hash_of(record);
        self.location_of(&hash, record).map(|l| l.path.as_slice())
    }

    /// Returns true if this record handle is indexed
    pub fn contains(&self, record: &Record) -> bool {
        self.key_path(record).is_some()
    }

    /// Number of indexed records
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of distinct first-level keys
    pub fn key_count(&self) -> usize {
        self.root.key_count()
    }

    /// Clear all entries
    pub fn clear(&mut self) {
        self.root = Node::default();
        self.locations.clear();
        self.len = 0;
    }

    fn check_arity(&self, keys: &[IndexKey]) -> IndexResult<()> {
        if keys.len() > self.fields.len() {
            return Err(IndexError::KeyArity {
                given: keys.len(),
                fields: self.fields.len(),
            });
        }
        Ok(())
    }
}

fn validate_extractor(extractor: &KeyExtractor) -> IndexResult<()> {
    if let Some(path) = extractor.field_name() {
        if path.split('.').any(str::is_empty) {
            return Err(IndexError::malformed_field_list(format!(
                "invalid field path '{}'",
                path
            )));
        }
    }
    Ok(())
}
