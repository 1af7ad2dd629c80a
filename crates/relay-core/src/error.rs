//! Common error types for the parameter layer

use thiserror::Error;

/// Result type for parameter layer operations
pub type RelayResult<T> = Result<T, RelayError>;

/// Errors surfaced by discovery, get and set operations
#[derive(Debug, Error)]
pub enum RelayError {
    /// Device has no address, refused the connection, or timed out on every request
    #[error("Device unreachable: {device_id}: {reason}")]
    UnreachableDevice { device_id: String, reason: String },

    /// Device was still working when its group deadline ran out
    #[error("Device did not finish in time: {device_id}: {reason}")]
    Unfinished { device_id: String, reason: String },

    /// Device answered but no usable schema could be inferred
    #[error("Discovery failed for {device_id}: {reason}")]
    DiscoveryFailed { device_id: String, reason: String },

    /// Parameter resolves to nothing after all fallbacks
    #[error("Parameter not found: {0}")]
    ParameterNotFound(String),

    /// Write attempted on a read-only parameter
    #[error("Parameter is read-only: {0}")]
    ReadOnlyParameter(String),

    /// Every dispatch strategy was exhausted without success
    #[error("Write failed for {parameter}: {reason}")]
    WriteFailed { parameter: String, reason: String },

    /// Device accepted the write but reads back a different value
    #[error("Verification mismatch for {parameter}: wrote {expected}, read {observed}")]
    VerificationMismatch {
        parameter: String,
        expected: serde_json::Value,
        observed: serde_json::Value,
    },

    /// Value does not satisfy the parameter definition
    #[error("Invalid value for {parameter}: {reason}")]
    InvalidValue { parameter: String, reason: String },

    /// Device generation has no protocol implementation
    #[error("Unsupported device generation: {0}")]
    UnsupportedGeneration(String),

    /// Device returned an error payload (RPC error, malformed body)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Persisting or loading capability documents failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RelayError {
    /// Create an unreachable-device error
    pub fn unreachable(device_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnreachableDevice {
            device_id: device_id.into(),
            reason: reason.into(),
        }
    }

    /// Create a write-failed error
    pub fn write_failed(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::WriteFailed {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error means the device could not be reached at all
    pub fn is_unreachable(&self) -> bool {
        matches!(self, RelayError::UnreachableDevice { .. })
    }

    /// Short machine-readable kind, used when errors are captured as data
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::UnreachableDevice { .. } => "unreachable_device",
            RelayError::Unfinished { .. } => "unfinished",
            RelayError::DiscoveryFailed { .. } => "discovery_failed",
            RelayError::ParameterNotFound(_) => "parameter_not_found",
            RelayError::ReadOnlyParameter(_) => "read_only_parameter",
            RelayError::WriteFailed { .. } => "write_failed",
            RelayError::VerificationMismatch { .. } => "verification_mismatch",
            RelayError::InvalidValue { .. } => "invalid_value",
            RelayError::UnsupportedGeneration(_) => "unsupported_generation",
            RelayError::Protocol(_) => "protocol",
            RelayError::Storage(_) => "storage",
            RelayError::Config(_) => "config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreachable_helper() {
        let err = RelayError::unreachable("shellyplug-s-AABBCC", "no IP address");
        assert!(err.is_unreachable());
        assert_eq!(err.kind(), "unreachable_device");
        assert_eq!(
            err.to_string(),
            "Device unreachable: shellyplug-s-AABBCC: no IP address"
        );
    }

    #[test]
    fn test_unfinished_is_not_unreachable() {
        let err = RelayError::Unfinished {
            device_id: "shellyplug-s-AABBCC".to_string(),
            reason: "no result within 100ms".to_string(),
        };
        assert!(!err.is_unreachable());
        assert_eq!(err.kind(), "unfinished");
        assert_eq!(
            err.to_string(),
            "Device did not finish in time: shellyplug-s-AABBCC: no result within 100ms"
        );
    }

    #[test]
    fn test_read_only_is_not_unreachable() {
        let err = RelayError::ReadOnlyParameter("uptime".to_string());
        assert!(!err.is_unreachable());
        assert_eq!(err.kind(), "read_only_parameter");
    }
}
