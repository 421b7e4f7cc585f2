//! Query subsystem for memdex
//!
//! A `Query` reads candidates from exactly one index, then narrows, orders
//! and pages them in memory.
//!
//! # Execution Flow
//!
//! 1. One index operation fills the buffer (or a full primary scan)
//! 2. Clauses filter the buffer, combined left to right
//! 3. Sort, skip and limit reshape it
//! 4. `run` hands the buffer over and terminates the query
//!
//! Selections are parsed before any record is read, so unknown operators and
//! bad patterns fail without side effects.

mod builder;
mod errors;
mod filters;
mod selection;
mod sorter;

pub use builder::{Query, QueryOptions};
pub use errors::{QueryError, QueryResult};
pub use filters::PredicateFilter;
pub use selection::{Clause, Operator, Selection, SortDirection, SortSpec, RESERVED_KEYS};
pub use sorter::ResultSorter;

pub(crate) use selection::type_name;
