//! Sorted composite index subsystem
//!
//! Indexes map an ordered tuple of key fields to the set of records sharing
//! that tuple. Nodes are sorted arrays searched by binary search; a node's
//! children are either leaves of records or nested nodes over the remaining
//! fields.
//!
//! # Invariants
//!
//! - `keys` strictly increasing at every level
//! - Empty nodes are pruned immediately
//! - A record's key path equals its key tuple at insertion time
//! - Traversal is depth-first, left to right, i.e. in key order

mod errors;
mod key;
mod node;
mod range;
mod sorted;

pub use errors::{IndexError, IndexResult};
pub use key::{IndexKey, KeyExtractor, KeyFn};
pub use node::Records;
pub use range::{RangeOptions, RangeQuery};
pub use sorted::{IndexOptions, SortedIndex, DEFAULT_HASH_FIELD};
