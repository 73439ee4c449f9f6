//! Error types for relq

use crate::dialect::Dialect;
use thiserror::Error;

/// Result type alias for relq operations
pub type QueryResult<T> = Result<T, QueryError>;

/// Error types for query building and execution
#[derive(Debug, Clone, Error)]
pub enum QueryError {
    /// Database connection error (reported by the execution collaborator)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Statement execution error (reported by the execution collaborator)
    #[error("Execution error: {0}")]
    Execution(String),

    /// Builder misuse detected before execution
    #[error("Validation error: {0}")]
    Validation(String),

    /// A builder intent that has no rendering on the target dialect
    #[error("{feature} is not supported on {dialect}")]
    Unsupported { dialect: Dialect, feature: String },

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Result projection / value conversion error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Value serialization error (JSON binding)
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl QueryError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an unsupported-feature error for a dialect
    pub fn unsupported(dialect: Dialect, feature: impl Into<String>) -> Self {
        Self::Unsupported {
            dialect,
            feature: feature.into(),
        }
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if this is an unsupported-feature error
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<serde_json::Error> for QueryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
