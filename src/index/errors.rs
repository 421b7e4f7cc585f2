//! Index error types
//!
//! Every index error is a usage error: it is reported to the caller of the
//! single operation and never leaves the index modified.

use thiserror::Error;

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// Index errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    /// Field list is empty or names an invalid field
    #[error("Malformed field list: {0}")]
    MalformedFieldList(String),

    /// Key tuple is longer than the field list
    #[error("Key tuple has {given} segments but the index has {fields} fields")]
    KeyArity { given: usize, fields: usize },

    /// Operator range object could not be interpreted
    #[error("Malformed range: {0}")]
    MalformedRange(String),
}

impl IndexError {
    /// Create a malformed field list error
    pub fn malformed_field_list(reason: impl Into<String>) -> Self {
        Self::MalformedFieldList(reason.into())
    }

    /// Create a malformed range error
    pub fn malformed_range(reason: impl Into<String>) -> Self {
        Self::MalformedRange(reason.into())
    }

    /// Get error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedFieldList(_) => "INDEX_MALFORMED_FIELD_LIST",
            Self::KeyArity { .. } => "INDEX_KEY_ARITY",
            Self::MalformedRange(_) => "INDEX_MALFORMED_RANGE",
        }
    }
}
