//! Error types for Kubescope Core

use thiserror::Error;

/// Result type alias using Kubescope's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Kubescope core error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to fetch {kind}: {message}")]
    Source { kind: String, message: String },

    #[error("Unknown resource kind: {0}")]
    UnknownKind(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Refresh superseded by a newer request (generation {generation})")]
    Superseded { generation: u64 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
