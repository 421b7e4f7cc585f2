//! Collection subsystem for memdex
//!
//! A collection owns its records and keeps a primary index, any number of
//! named secondary indexes, and an insertion-time index in step.
//!
//! # Add Flow
//!
//! 1. Resolve options (defaults, collection config, call overrides)
//! 2. Validate every incoming record; any failure rejects the call
//! 3. Insert new records into every index, or merge/replace existing ones
//!    and re-position them
//! 4. Notify subscribers

mod collection;
mod config;
mod errors;
mod events;

pub use collection::{Added, Collection, ADDED_INDEX};
pub use config::{AddOptions, CollectionConfig, OnConflict};
pub use errors::{CollectionError, CollectionResult, ErrorKind};
pub use events::{CollectionEvent, EventType, Listener, SubscriptionId};
