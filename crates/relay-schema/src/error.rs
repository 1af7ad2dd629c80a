//! Error types for the capability store

use relay_core::RelayError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    /// Document does not describe a usable capability
    #[error("invalid capability document {source_name}: {reason}")]
    InvalidDocument { source_name: String, reason: String },

    /// YAML parsing or serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations
pub type SchemaResult<T> = Result<T, SchemaError>;

impl From<tempfile::PersistError> for SchemaError {
    fn from(err: tempfile::PersistError) -> Self {
        SchemaError::Io(err.error)
    }
}

impl From<SchemaError> for RelayError {
    fn from(err: SchemaError) -> Self {
        RelayError::Storage(err.to_string())
    }
}
