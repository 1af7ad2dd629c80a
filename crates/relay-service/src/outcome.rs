//! What a write reports back

use relay_core::RelayError;
use serde::Serialize;
use serde_json::Value;

/// Phases of a single `set`, logged at debug level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePhase {
    Resolving,
    Dispatching,
    Verifying,
    Succeeded,
    Failed,
}

impl std::fmt::Display for WritePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WritePhase::Resolving => "resolving",
            WritePhase::Dispatching => "dispatching",
            WritePhase::Verifying => "verifying",
            WritePhase::Succeeded => "succeeded",
            WritePhase::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Result of reading a value back after a write
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Verification {
    /// Verification is disabled
    Skipped,
    /// Read-back equals the written value
    Matched,
    /// Read-back disagrees
    Mismatch { observed: Value },
    /// Nothing could be read back; the device's answer is taken at its word
    Unverifiable,
}

impl Verification {
    /// Everything except a mismatch lets the write stand
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Verification::Mismatch { .. })
    }
}

/// One dispatch attempt within a write
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyAttempt {
    /// Gen1 strategy name, or the RPC method
    pub strategy: String,
    /// Request as sent, e.g. `GET /settings?eco_mode=false`
    pub request: String,
    /// HTTP status, when the device answered
    pub status: Option<u16>,
    pub verification: Verification,
    /// Transport error, when it did not
    pub error: Option<String>,
}

impl StrategyAttempt {
    pub fn new(strategy: impl Into<String>, request: impl ToString) -> Self {
        Self {
            strategy: strategy.into(),
            request: request.to_string(),
            status: None,
            verification: Verification::Skipped,
            error: None,
        }
    }

    fn summary(&self) -> String {
        match (&self.error, self.status, &self.verification) {
            (Some(error), _, _) => format!("{}: {}", self.strategy, error),
            (None, Some(status), Verification::Mismatch { observed }) => {
                format!("{}: HTTP {} but read back {}", self.strategy, status, observed)
            }
            (None, Some(status), _) => format!("{}: HTTP {}", self.strategy, status),
            (None, None, _) => format!("{}: no reply", self.strategy),
        }
    }
}

/// Reason text for a write that exhausted its attempts
pub(crate) fn exhausted(attempts: &[StrategyAttempt]) -> String {
    if attempts.is_empty() {
        return "no applicable write strategy".to_string();
    }
    attempts
        .iter()
        .map(StrategyAttempt::summary)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A write the device accepted
///
/// Failed writes are errors (`WriteFailed`), so an outcome always describes
/// success; `warnings` carries anything worth reporting alongside it, such
/// as a `VerificationMismatch` on an RPC device or a failed reboot.
#[derive(Debug)]
pub struct WriteOutcome {
    pub parameter: String,
    /// Value as written, in canonical form
    pub value: Value,
    /// Strategy (Gen1) or method (RPC) that succeeded
    pub strategy: String,
    /// Device reply body, when it was JSON
    pub response: Option<Value>,
    pub attempts: Vec<StrategyAttempt>,
    pub warnings: Vec<RelayError>,
    /// Device reported that the change needs a reboot
    pub restart_required: bool,
    /// A reboot was issued after the write
    pub restarted: bool,
}

impl WriteOutcome {
    pub fn new(parameter: impl Into<String>, value: Value, strategy: impl Into<String>) -> Self {
        Self {
            parameter: parameter.into(),
            value,
            strategy: strategy.into(),
            response: None,
            attempts: Vec::new(),
            warnings: Vec::new(),
            restart_required: false,
            restarted: false,
        }
    }
}

/// Loose equality between a written value and what the device reports
///
/// Gen1 firmware echoes booleans as `"on"`/`"off"` and numbers as strings on
/// some endpoints; these still count as a match.
pub fn values_match(expected: &Value, observed: &Value) -> bool {
    if expected == observed {
        return true;
    }
    match (expected, observed) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::Bool(b), Value::String(s)) | (Value::String(s), Value::Bool(b)) => {
            parse_bool(s) == Some(*b)
        }
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            s.trim().parse::<f64>().ok() == n.as_f64()
        }
        (Value::Bool(b), Value::Number(n)) | (Value::Number(n), Value::Bool(b)) => {
            n.as_f64() == Some(if *b { 1.0 } else { 0.0 })
        }
        (Value::String(a), Value::String(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "1" => Some(true),
        "off" | "false" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_values_match() {
        assert!(values_match(&json!(false), &json!(false)));
        assert!(values_match(&json!(true), &json!("on")));
        assert!(values_match(&json!(false), &json!("off")));
        assert!(values_match(&json!(60.0), &json!(60)));
        assert!(values_match(&json!(1500), &json!("1500")));
        assert!(values_match(&json!("Last"), &json!("last")));
        assert!(values_match(&json!(true), &json!(1)));

        assert!(!values_match(&json!(true), &json!(false)));
        assert!(!values_match(&json!(true), &json!("maybe")));
        assert!(!values_match(&json!(1500), &json!(1000)));
        assert!(!values_match(&json!("a"), &json!(null)));
    }

    #[test]
    fn test_exhausted_reason() {
        let mut refused = StrategyAttempt::new("settings_query", "GET /settings?eco_mode=false");
        refused.status = Some(404);
        let mut ignored = StrategyAttempt::new("save_flag", "GET /settings?eco_mode=false&save=1");
        ignored.status = Some(200);
        ignored.verification = Verification::Mismatch {
            observed: json!(true),
        };

        assert_eq!(
            exhausted(&[refused, ignored]),
            "settings_query: HTTP 404; save_flag: HTTP 200 but read back true"
        );
        assert_eq!(exhausted(&[]), "no applicable write strategy");
    }

    #[test]
    fn test_verification_serializes_tagged() {
        let v = Verification::Mismatch {
            observed: json!("off"),
        };
        assert_eq!(
            serde_json::to_value(&v).unwrap(),
            json!({"result": "mismatch", "observed": "off"})
        );
        assert!(!v.is_accepted());
        assert!(Verification::Unverifiable.is_accepted());
    }
}
