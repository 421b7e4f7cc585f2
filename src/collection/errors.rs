//! Collection error types
//!
//! Error codes:
//! - COLLECTION_MISSING_KEY (MissingKey)
//! - COLLECTION_NOT_AN_OBJECT (Usage)
//! - COLLECTION_RESERVED_INDEX (Usage)
//! - COLLECTION_HASH_CODE_OVERRIDE (Usage)
//! - INDEX_* and QUERY_* codes pass through (Usage)

use std::fmt;

use thiserror::Error;

use crate::index::IndexError;
use crate::query::QueryError;

/// Result type for collection operations
pub type CollectionResult<T> = Result<T, CollectionError>;

/// Error classes surfaced by the collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid arguments or call sequence
    Usage,
    /// A record lacked a usable primary key and none could be generated
    MissingKey,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Usage => write!(f, "USAGE"),
            ErrorKind::MissingKey => write!(f, "MISSING_KEY"),
        }
    }
}

/// Collection errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectionError {
    /// Primary key absent or not a string/number
    #[error("Record has no usable '{field}' key (found {found})")]
    MissingKey { field: String, found: String },

    /// Incoming record was not a JSON object
    #[error("Expected an object but found {0}")]
    NotAnObject(String),

    /// Index name is managed by the collection itself
    #[error("Index name '{0}' is reserved")]
    ReservedIndex(String),

    /// Secondary indexes are hashed on the id attribute only
    #[error("Index '{0}' cannot override the hash code")]
    HashCodeOverride(String),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Query(#[from] QueryError),
}

impl CollectionError {
    /// Returns the error class
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingKey { .. } => ErrorKind::MissingKey,
            _ => ErrorKind::Usage,
        }
    }

    /// Get error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingKey { .. } => "COLLECTION_MISSING_KEY",
            Self::NotAnObject(_) => "COLLECTION_NOT_AN_OBJECT",
            Self::ReservedIndex(_) => "COLLECTION_RESERVED_INDEX",
            Self::HashCodeOverride(_) => "COLLECTION_HASH_CODE_OVERRIDE",
            Self::Index(e) => e.code(),
            Self::Query(e) => e.code(),
        }
    }

    /// Returns true for errors caused by the caller
    pub fn is_usage(&self) -> bool {
        self.kind() == ErrorKind::Usage
    }
}
