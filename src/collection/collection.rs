//! Keyed record collection
//!
//! # Indexes
//!
//! - primary: keyed and hashed on the id attribute
//! - secondary: named, built by `create_index`, hashed on the id attribute
//! - `addedTimestamps`: insertion time in milliseconds, oldest first
//!
//! # Invariants
//!
//! - Every record in the primary index is in every other index
//! - Validation of a whole `add` call precedes any index mutation
//! - Conflicting adds update the existing record in place; the handle held
//!   by callers stays valid

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use super::config::{AddOptions, CollectionConfig, OnConflict, ResolvedAdd};
use super::errors::{CollectionError, CollectionResult};
use super::events::{CollectionEvent, Listeners, SubscriptionId};
use crate::index::{IndexKey, IndexOptions, KeyExtractor, RangeOptions, SortedIndex};
use crate::query::{type_name, Query, QueryError, QueryOptions, QueryResult};
use crate::record::Record;

/// Name of the built-in insertion-time index
pub const ADDED_INDEX: &str = "addedTimestamps";

const ADDED_FIELD: &str = "$added";

/// Result of `add`, shaped like its input
#[derive(Debug, Clone)]
pub enum Added {
    /// A single object was added
    One(Record),
    /// An array of objects was added, in input order
    Many(Vec<Record>),
}

impl Added {
    /// Flattens into a list of records
    pub fn into_vec(self) -> Vec<Record> {
        match self {
            Added::One(record) => vec![record],
            Added::Many(records) => records,
        }
    }
}

/// An incoming record that passed validation
struct Pending {
    fields: Map<String, Value>,
    id: IndexKey,
    generated: bool,
}

/// In-memory collection of keyed records with secondary indexes.
#[derive(Debug)]
pub struct Collection {
    config: CollectionConfig,
    primary: SortedIndex,
    indexes: BTreeMap<String, SortedIndex>,
    added: SortedIndex,
    auto_pks: BTreeSet<IndexKey>,
    listeners: Listeners,
}

impl Default for Collection {
    fn default() -> Self {
        Self::new(CollectionConfig::default())
    }
}

impl Collection {
    /// Creates an empty collection
    pub fn new(config: CollectionConfig) -> Self {
        let id = id_extractor(&config.id_attribute);
        Self {
            primary: SortedIndex::from_parts(vec![id.clone()], id.clone()),
            added: SortedIndex::from_parts(vec![KeyExtractor::field(ADDED_FIELD)], id),
            indexes: BTreeMap::new(),
            auto_pks: BTreeSet::new(),
            listeners: Listeners::default(),
            config,
        }
    }

    pub fn config(&self) -> &CollectionConfig {
        &self.config
    }

    /// Name of the primary key field
    pub fn model_id(&self) -> &str {
        &self.config.id_attribute
    }

    /// Primary key value of a record
    pub fn model_id_of(&self, record: &Record) -> Option<Value> {
        record.fields().get(&self.config.id_attribute).cloned()
    }

    // ==================
    // Mutation
    // ==================

    /// Adds an object or an array of objects.
    ///
    /// Existing keys are merged or replaced per the resolved conflict policy.
    pub fn add(&mut self, input: Value, opts: &AddOptions) -> CollectionResult<Added> {
        match input {
            Value::Array(items) => self.add_many(items, opts).map(Added::Many),
            Value::Object(fields) => self.add_fields(fields, opts).map(Added::One),
            other => {
                let err = CollectionError::NotAnObject(type_name(&other).to_string());
                warn!(target: "memdex::collection", code = err.code(), "add rejected");
                Err(err)
            }
        }
    }

    /// Adds a single object
    pub fn add_one(&mut self, input: Value, opts: &AddOptions) -> CollectionResult<Record> {
        match input {
            Value::Object(fields) => self.add_fields(fields, opts),
            other => {
                let err = CollectionError::NotAnObject(type_name(&other).to_string());
                warn!(target: "memdex::collection", code = err.code(), "add rejected");
                Err(err)
            }
        }
    }

    /// Adds a list of objects. One invalid entry rejects the whole list.
    pub fn add_many(&mut self, inputs: Vec<Value>, opts: &AddOptions) -> CollectionResult<Vec<Record>> {
        let resolved = opts.resolve(&self.config);
        let pending = inputs
            .into_iter()
            .map(|input| match input {
                Value::Object(fields) => self.validate(fields, &resolved),
                other => Err(CollectionError::NotAnObject(type_name(&other).to_string())),
            })
            .collect::<CollectionResult<Vec<_>>>()
            .inspect_err(|err| {
                warn!(target: "memdex::collection", code = err.code(), "add rejected");
            })?;

        Ok(self.apply(pending, resolved.on_conflict))
    }

    fn add_fields(&mut self, fields: Map<String, Value>, opts: &AddOptions) -> CollectionResult<Record> {
        let resolved = opts.resolve(&self.config);
        let pending = self.validate(fields, &resolved).inspect_err(|err| {
            warn!(target: "memdex::collection", code = err.code(), "add rejected");
        })?;

        let (record, updated) = self.apply_one(pending, resolved.on_conflict);
        debug!(target: "memdex::collection", updated, total = self.len(), "add");
        Ok(record)
    }

    /// Checks the primary key, generating one when allowed
    fn validate(&self, mut fields: Map<String, Value>, opts: &ResolvedAdd) -> CollectionResult<Pending> {
        let attr = &self.config.id_attribute;
        if let Some(value @ (Value::String(_) | Value::Number(_))) = fields.get(attr) {
            let id = IndexKey::from_json(value);
            return Ok(Pending {
                fields,
                id,
                generated: false,
            });
        }

        let found = fields.get(attr).map(type_name).unwrap_or("nothing");
        if !opts.auto_pk {
            return Err(CollectionError::MissingKey {
                field: attr.clone(),
                found: found.to_string(),
            });
        }

        let id = Uuid::new_v4().to_string();
        fields.insert(attr.clone(), Value::String(id.clone()));
        Ok(Pending {
            fields,
            id: IndexKey::String(id),
            generated: true,
        })
    }

    fn apply(&mut self, pending: Vec<Pending>, on_conflict: OnConflict) -> Vec<Record> {
        let mut updated = 0usize;
        let out: Vec<Record> = pending
            .into_iter()
            .map(|entry| {
                let (record, was_update) = self.apply_one(entry, on_conflict);
                updated += usize::from(was_update);
                record
            })
            .collect();

        debug!(
            target: "memdex::collection",
            inserted = out.len() - updated,
            updated,
            total = self.len(),
            "add"
        );
        out
    }

    /// Inserts one validated record, or resolves its conflict.
    ///
    /// Returns the stored handle and whether an existing record was updated.
    fn apply_one(&mut self, pending: Pending, on_conflict: OnConflict) -> (Record, bool) {
        let Pending { fields, id, generated } = pending;

        if let Some(existing) = self.get(&id) {
            {
                let mut target = existing.fields_mut();
                match on_conflict {
                    OnConflict::Merge => merge_fields(&mut target, fields),
                    OnConflict::Replace => {
                        replace_fields(&mut target, fields, &self.config.id_attribute)
                    }
                }
            }
            self.update_indexes(&existing);
            self.listeners.emit(&CollectionEvent::Updated(existing.clone()));
            return (existing, true);
        }

        let record = Record::new(fields);
        self.primary.insert_record(&record);
        for index in self.indexes.values_mut() {
            index.insert_record(&record);
        }
        self.added
            .insert_at(vec![IndexKey::Int(Utc::now().timestamp_millis())], &record);
        if generated {
            self.auto_pks.insert(id);
        }
        self.listeners.emit(&CollectionEvent::Added(record.clone()));
        (record, false)
    }

    /// Removes a record by primary key
    pub fn remove(&mut self, id: &IndexKey) -> Option<Record> {
        let record = self.get(id)?;

        self.primary.remove_record(&record);
        for index in self.indexes.values_mut() {
            index.remove_record(&record);
        }
        self.added.remove_record(&record);
        self.auto_pks.remove(id);

        debug!(target: "memdex::collection", id = %id, "remove");
        self.listeners.emit(&CollectionEvent::Removed(record.clone()));
        Some(record)
    }

    /// Removes every record matching a selection
    pub fn remove_all(&mut self, criteria: &Value) -> CollectionResult<Vec<Record>> {
        let matched = self.query().filter(criteria)?.run();

        let mut removed = Vec::with_capacity(matched.len());
        for record in matched {
            let id = self.primary.hash_of(&record);
            if let Some(record) = self.remove(&id) {
                removed.push(record);
            }
        }

        debug!(target: "memdex::collection", removed = removed.len(), "remove_all");
        Ok(removed)
    }

    /// Builds (or rebuilds) a named secondary index and backfills it.
    ///
    /// `fields` defaults to `[name]`. The hash code is always the id
    /// attribute; `options.hash_code` must be unset.
    pub fn create_index(
        &mut self,
        name: &str,
        fields: Option<Vec<KeyExtractor>>,
        options: IndexOptions,
    ) -> CollectionResult<()> {
        if name == ADDED_INDEX {
            return Err(CollectionError::ReservedIndex(name.to_string()));
        }

        if options.hash_code.is_some() {
            return Err(CollectionError::HashCodeOverride(name.to_string()));
        }

        let fields = fields.unwrap_or_else(|| vec![KeyExtractor::field(name)]);
        let options = IndexOptions {
            hash_code: Some(id_extractor(&self.config.id_attribute)),
        };
        let mut index = SortedIndex::new(fields, options)?;

        for record in self.primary.visit_all() {
            index.insert_record(record);
        }

        debug!(target: "memdex::collection", name, backfilled = index.len(), "create_index");
        self.indexes.insert(name.to_string(), index);
        Ok(())
    }

    /// Re-positions a record in one secondary index after in-place mutation
    pub fn update_index(&mut self, record: &Record, name: &str) -> CollectionResult<()> {
        if name == ADDED_INDEX {
            return Err(CollectionError::ReservedIndex(name.to_string()));
        }
        let index = self
            .indexes
            .get_mut(name)
            .ok_or_else(|| QueryError::UnknownIndex(name.to_string()))?;
        index.update_record(record);
        Ok(())
    }

    /// Re-positions a record in every index after in-place mutation.
    ///
    /// The insertion timestamp is kept.
    pub fn update_indexes(&mut self, record: &Record) {
        self.primary.update_record(record);
        for index in self.indexes.values_mut() {
            index.update_record(record);
        }
    }

    // ==================
    // Reads
    // ==================

    /// Starts a single-use query
    pub fn query(&self) -> Query<'_> {
        Query::new(self)
    }

    /// Looks a record up by primary key
    pub fn get(&self, id: &IndexKey) -> Option<Record> {
        self.primary
            .get(std::slice::from_ref(id))
            .ok()
            .and_then(|records| records.into_iter().next())
    }

    /// Concatenated lookups on the chosen index
    pub fn get_all(&self, key_lists: &[Vec<IndexKey>], opts: &QueryOptions) -> CollectionResult<Vec<Record>> {
        Ok(self.query().get_all(key_lists, opts)?.run())
    }

    /// Range scan on the chosen index
    pub fn between(
        &self,
        left: &[IndexKey],
        right: &[IndexKey],
        range: &RangeOptions,
        opts: &QueryOptions,
    ) -> CollectionResult<Vec<Record>> {
        Ok(self.query().between(left, right, range, opts)?.run())
    }

    /// Records matching a selection
    pub fn filter(&self, criteria: &Value) -> CollectionResult<Vec<Record>> {
        Ok(self.query().filter(criteria)?.run())
    }

    /// Records in primary key order, without the first `n`
    pub fn skip(&self, n: usize) -> Vec<Record> {
        self.primary.visit_all().skip(n).cloned().collect()
    }

    /// First `n` records in primary key order
    pub fn limit(&self, n: usize) -> Vec<Record> {
        self.primary.visit_all().take(n).cloned().collect()
    }

    pub fn for_each<F>(&self, f: F)
    where
        F: FnMut(&Record),
    {
        self.primary.visit_all().for_each(f);
    }

    pub fn map<T, F>(&self, f: F) -> Vec<T>
    where
        F: FnMut(&Record) -> T,
    {
        self.primary.visit_all().map(f).collect()
    }

    pub fn reduce<A, F>(&self, init: A, f: F) -> A
    where
        F: FnMut(A, &Record) -> A,
    {
        self.primary.visit_all().fold(init, f)
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.primary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_empty()
    }

    /// Names of the secondary indexes, sorted
    pub fn index_names(&self) -> Vec<&str> {
        self.indexes.keys().map(String::as_str).collect()
    }

    /// Records whose keys were generated
    pub fn auto_pk_records(&self) -> Vec<Record> {
        self.auto_pks.iter().filter_map(|id| self.get(id)).collect()
    }

    /// When the record with `id` was first inserted
    pub fn added_at(&self, id: &IndexKey) -> Option<DateTime<Utc>> {
        let record = self.get(id)?;
        match self.added.key_path(&record)?.first()? {
            IndexKey::Int(millis) => DateTime::from_timestamp_millis(*millis),
            _ => None,
        }
    }

    // ==================
    // Events
    // ==================

    /// Registers a listener invoked after every mutation
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&CollectionEvent) + Send + 'static,
    {
        self.listeners.subscribe(Box::new(listener))
    }

    /// Removes a listener. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }

    pub(crate) fn primary(&self) -> &SortedIndex {
        &self.primary
    }

    pub(crate) fn resolve_index(&self, name: Option<&str>) -> QueryResult<&SortedIndex> {
        match name {
            None => Ok(&self.primary),
            Some(ADDED_INDEX) => Ok(&self.added),
            Some(name) => self
                .indexes
                .get(name)
                .ok_or_else(|| QueryError::UnknownIndex(name.to_string())),
        }
    }
}

/// Reads the id attribute as a literal top-level key
fn id_extractor(attribute: &str) -> KeyExtractor {
    let attribute = attribute.to_string();
    KeyExtractor::function(move |fields: &Map<String, Value>| {
        fields.get(&attribute).cloned().unwrap_or(Value::Null)
    })
}

/// Deep merge: objects merge recursively, everything else is replaced
fn merge_fields(target: &mut Map<String, Value>, incoming: Map<String, Value>) {
    for (key, value) in incoming {
        match value {
            Value::Object(nested) => match target.get_mut(&key) {
                Some(Value::Object(existing)) => merge_fields(existing, nested),
                _ => {
                    target.insert(key, Value::Object(nested));
                }
            },
            other => {
                target.insert(key, other);
            }
        }
    }
}

/// Drops fields (except the id) the incoming record lacks, then copies it
fn replace_fields(target: &mut Map<String, Value>, incoming: Map<String, Value>, id_attribute: &str) {
    let stale: Vec<String> = target
        .keys()
        .filter(|key| key.as_str() != id_attribute && !incoming.contains_key(key.as_str()))
        .cloned()
        .collect();
    for key in stale {
        target.shift_remove(&key);
    }
    for (key, value) in incoming {
        target.insert(key, value);
    }
}
