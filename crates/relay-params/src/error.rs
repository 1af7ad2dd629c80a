//! Error types for the parameter catalog

use relay_core::RelayError;
use thiserror::Error;

/// Errors raised while loading the catalog or checking values against it
#[derive(Debug, Error)]
pub enum ParamError {
    /// No definition under that canonical name
    #[error("unknown parameter: {0}")]
    UnknownParameter(String),

    /// Value cannot be coerced to the definition's type or violates its bounds
    #[error("invalid value for {parameter}: {reason}")]
    InvalidValue { parameter: String, reason: String },

    /// Definition itself is inconsistent (empty enum, min above max)
    #[error("invalid definition for {name}: {reason}")]
    InvalidDefinition { name: String, reason: String },

    /// YAML parsing error
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for catalog operations
pub type ParamResult<T> = Result<T, ParamError>;

impl ParamError {
    pub(crate) fn invalid_value(parameter: &str, reason: impl Into<String>) -> Self {
        ParamError::InvalidValue {
            parameter: parameter.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<ParamError> for RelayError {
    fn from(err: ParamError) -> Self {
        match err {
            ParamError::UnknownParameter(name) => RelayError::ParameterNotFound(name),
            ParamError::InvalidValue { parameter, reason } => {
                RelayError::InvalidValue { parameter, reason }
            }
            other => RelayError::Config(other.to_string()),
        }
    }
}
