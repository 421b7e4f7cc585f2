//! Query error types
//!
//! All query errors are usage errors: synchronous, fatal to the single call,
//! never retried.

use thiserror::Error;

use crate::index::IndexError;

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;

/// Query errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// Operation not allowed in the query's current state
    #[error("Illegal query state: {0}")]
    IllegalState(String),

    /// Argument of the wrong type or out of range
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Named secondary index does not exist
    #[error("Unknown index: {0}")]
    UnknownIndex(String),

    /// Filter operator is not recognised
    #[error("Unknown operator '{0}'")]
    UnknownOperator(String),

    /// like/notLike pattern could not be compiled
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    /// Index rejected the lookup
    #[error(transparent)]
    Index(#[from] IndexError),
}

impl QueryError {
    /// Create an illegal state error
    pub fn illegal_state(reason: impl Into<String>) -> Self {
        Self::IllegalState(reason.into())
    }

    /// Create an invalid argument error
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument(reason.into())
    }

    /// Get error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::IllegalState(_) => "QUERY_ILLEGAL_STATE",
            Self::InvalidArgument(_) => "QUERY_INVALID_ARGUMENT",
            Self::UnknownIndex(_) => "QUERY_UNKNOWN_INDEX",
            Self::UnknownOperator(_) => "QUERY_UNKNOWN_OPERATOR",
            Self::InvalidPattern(_) => "QUERY_INVALID_PATTERN",
            Self::Index(e) => e.code(),
        }
    }
}
