//! Single-use fluent query over a collection's indexes
//!
//! A query starts unconsumed. Exactly one index operation (`get`, `get_all`,
//! `between`, `range`) fills its buffer; refinements then reshape the buffer
//! and `run` hands it over.
//!
//! ```text
//! Unconsumed --index op--> Materialized --run/map_call--> Terminated
//!     |                        ^
//!     +------refinement--------+   (full primary scan first)
//! ```

use serde_json::Value;
use tracing::trace;

use super::errors::{QueryError, QueryResult};
use super::filters::PredicateFilter;
use super::selection::{Selection, SortSpec};
use super::sorter::ResultSorter;
use crate::collection::Collection;
use crate::index::{IndexKey, RangeOptions, SortedIndex};
use crate::record::Record;

/// Options for an index-consuming operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Index to read from (default: primary)
    pub index: Option<String>,
}

impl QueryOptions {
    /// Reads from the named secondary index
    pub fn index(name: impl Into<String>) -> Self {
        Self {
            index: Some(name.into()),
        }
    }
}

#[derive(Debug)]
enum State {
    Unconsumed,
    Materialized(Vec<Record>),
    Terminated,
}

/// A single-use query.
#[derive(Debug)]
pub struct Query<'a> {
    collection: &'a Collection,
    state: State,
}

impl<'a> Query<'a> {
    pub(crate) fn new(collection: &'a Collection) -> Self {
        Self {
            collection,
            state: State::Unconsumed,
        }
    }

    /// Point or prefix lookup. An empty key list scans the whole index.
    pub fn get(&mut self, keys: &[IndexKey], opts: &QueryOptions) -> QueryResult<&mut Self> {
        let index = self.consume("get", opts)?;
        let records = index.get(keys)?;
        self.materialize("get", opts, records)
    }

    /// Concatenated lookups for each key list. No lists scans the whole index.
    pub fn get_all(&mut self, key_lists: &[Vec<IndexKey>], opts: &QueryOptions) -> QueryResult<&mut Self> {
        let index = self.consume("get_all", opts)?;
        let records = if key_lists.is_empty() {
            index.get_all()
        } else {
            let mut records = Vec::new();
            for keys in key_lists {
                records.extend(index.get(keys)?);
            }
            records
        };
        self.materialize("get_all", opts, records)
    }

    /// Ordered range scan between two bound tuples
    pub fn between(
        &mut self,
        left: &[IndexKey],
        right: &[IndexKey],
        range: &RangeOptions,
        opts: &QueryOptions,
    ) -> QueryResult<&mut Self> {
        let index = self.consume("between", opts)?;
        let records = index.between(left, right, range)?;
        self.materialize("between", opts, records)
    }

    /// Range scan from an operator object such as `{">=": [18], "<": [30]}`
    pub fn range(&mut self, spec: &Value, opts: &QueryOptions) -> QueryResult<&mut Self> {
        let index = self.consume("range", opts)?;
        let records = index.query(spec)?;
        self.materialize("range", opts, records)
    }

    /// Keeps records matching a JSON selection, then applies its ordering
    /// and pagination.
    ///
    /// The selection is validated before any record is examined.
    pub fn filter(&mut self, criteria: &Value) -> QueryResult<&mut Self> {
        let selection = Selection::from_json(criteria)?;
        self.apply(&selection)
    }

    /// Applies a typed selection
    pub fn apply(&mut self, selection: &Selection) -> QueryResult<&mut Self> {
        let buffer = self.buffer("filter")?;
        if !selection.clauses.is_empty() {
            buffer.retain(|record| PredicateFilter::matches(&record.fields(), &selection.clauses));
        }
        if !selection.order_by.is_empty() {
            ResultSorter::sort(buffer, &selection.order_by);
        }
        if let Some(n) = selection.skip {
            skip_front(buffer, n);
        }
        if let Some(n) = selection.limit {
            buffer.truncate(n);
        }
        Ok(self)
    }

    /// Keeps records for which `predicate` returns true
    pub fn filter_by<F>(&mut self, mut predicate: F) -> QueryResult<&mut Self>
    where
        F: FnMut(&Record) -> bool,
    {
        self.buffer("filter_by")?.retain(|record| predicate(record));
        Ok(self)
    }

    /// Stable multi-key sort
    pub fn order_by(&mut self, specs: &[SortSpec]) -> QueryResult<&mut Self> {
        ResultSorter::sort(self.buffer("order_by")?, specs);
        Ok(self)
    }

    /// Drops the first `n` records
    pub fn skip(&mut self, n: usize) -> QueryResult<&mut Self> {
        skip_front(self.buffer("skip")?, n);
        Ok(self)
    }

    /// Keeps at most `n` records
    pub fn limit(&mut self, n: usize) -> QueryResult<&mut Self> {
        self.buffer("limit")?.truncate(n);
        Ok(self)
    }

    /// Visits each record in buffer order
    pub fn for_each<F>(&mut self, f: F) -> QueryResult<&mut Self>
    where
        F: FnMut(&Record),
    {
        self.buffer("for_each")?.iter().for_each(f);
        Ok(self)
    }

    /// Replaces each record with `f(record)`
    pub fn map<F>(&mut self, f: F) -> QueryResult<&mut Self>
    where
        F: FnMut(Record) -> Record,
    {
        let buffer = self.buffer("map")?;
        let mapped = buffer.drain(..).map(f).collect();
        *buffer = mapped;
        Ok(self)
    }

    /// Applies `method` to each record and terminates the query.
    ///
    /// `query.map_call(Record::to_value)` yields the flattened records.
    pub fn map_call<T, F>(&mut self, method: F) -> QueryResult<Vec<T>>
    where
        F: FnMut(&Record) -> T,
    {
        self.buffer("map_call")?;
        let records = self.take();
        Ok(records.iter().map(method).collect())
    }

    /// Returns the buffer and terminates the query.
    ///
    /// An unconsumed query scans the primary index first. Running a
    /// terminated query again yields nothing.
    pub fn run(&mut self) -> Vec<Record> {
        if let State::Unconsumed = self.state {
            self.state = State::Materialized(self.collection.primary().get_all());
        }
        self.take()
    }

    /// Returns true once an index operation has filled the buffer
    pub fn is_materialized(&self) -> bool {
        matches!(self.state, State::Materialized(_))
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self.state, State::Terminated)
    }

    fn consume(&self, op: &str, opts: &QueryOptions) -> QueryResult<&'a SortedIndex> {
        match self.state {
            State::Unconsumed => self.collection.resolve_index(opts.index.as_deref()),
            State::Materialized(_) => Err(QueryError::illegal_state(format!(
                "{}: the query has already consumed an index",
                op
            ))),
            State::Terminated => Err(QueryError::illegal_state(format!(
                "{}: the query has already been run",
                op
            ))),
        }
    }

    fn materialize(&mut self, op: &str, opts: &QueryOptions, records: Vec<Record>) -> QueryResult<&mut Self> {
        trace!(
            target: "memdex::query",
            op,
            index = opts.index.as_deref().unwrap_or("primary"),
            matched = records.len(),
            "index read"
        );
        self.state = State::Materialized(records);
        Ok(self)
    }

    fn buffer(&mut self, op: &str) -> QueryResult<&mut Vec<Record>> {
        if let State::Unconsumed = self.state {
            trace!(target: "memdex::query", op, "implicit full scan");
            self.state = State::Materialized(self.collection.primary().get_all());
        }
        match &mut self.state {
            State::Materialized(records) => Ok(records),
            _ => Err(QueryError::illegal_state(format!(
                "{}: the query has already been run",
                op
            ))),
        }
    }

    fn take(&mut self) -> Vec<Record> {
        match std::mem::replace(&mut self.state, State::Terminated) {
            State::Materialized(records) => records,
            _ => Vec::new(),
        }
    }
}

fn skip_front(records: &mut Vec<Record>, n: usize) {
    records.drain(..n.min(records.len()));
}
