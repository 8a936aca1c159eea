//! Context registry error types

use kubescope_core::limits::ValidationError;
use thiserror::Error;

/// Result type alias for registry operations
pub type ContextResult<T> = std::result::Result<T, ContextError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContextError {
    #[error("Cluster configuration unavailable: {0}")]
    ConfigUnavailable(String),

    #[error("Unknown context: {0}")]
    UnknownContext(String),

    #[error("No contexts found in cluster configuration")]
    NoContexts,

    #[error("Invalid argument: {0}")]
    Invalid(String),
}

impl From<ValidationError> for ContextError {
    fn from(err: ValidationError) -> Self {
        ContextError::Invalid(err.to_string())
    }
}
