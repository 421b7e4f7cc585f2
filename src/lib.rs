//! memdex - An in-memory record store with composite sorted indexes
//!
//! Records are JSON objects held by handle. A `Collection` keys them by an
//! id attribute, mirrors them into secondary `SortedIndex`es, and answers
//! single-use `Query` chains over any of those indexes.

pub mod collection;
pub mod index;
pub mod query;
pub mod record;

pub use collection::{
    AddOptions, Added, Collection, CollectionConfig, CollectionError, CollectionEvent,
    CollectionResult, OnConflict,
};
pub use index::{IndexError, IndexKey, IndexOptions, KeyExtractor, RangeOptions, SortedIndex};
pub use query::{Query, QueryError, QueryOptions, Selection, SortSpec};
pub use record::Record;
