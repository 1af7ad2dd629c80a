//! Parameter value types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Type of a parameter value
///
/// Shared by catalog definitions and by inferred capability entries, where
/// the type is read off the JSON kind of a device response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Boolean,
    Integer,
    Float,
    #[default]
    String,
    Enum,
    Object,
    Array,
    Null,
}

impl ParamType {
    /// Type of a JSON value as a device reported it
    ///
    /// ```
    /// # use relay_params::ParamType;
    /// # use serde_json::json;
    /// assert_eq!(ParamType::of(&json!(true)), ParamType::Boolean);
    /// assert_eq!(ParamType::of(&json!(3500)), ParamType::Integer);
    /// assert_eq!(ParamType::of(&json!(0.5)), ParamType::Float);
    /// assert_eq!(ParamType::of(&json!(null)), ParamType::Null);
    /// ```
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => ParamType::Null,
            Value::Bool(_) => ParamType::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => ParamType::Integer,
            Value::Number(_) => ParamType::Float,
            Value::String(_) => ParamType::String,
            Value::Array(_) => ParamType::Array,
            Value::Object(_) => ParamType::Object,
        }
    }

    /// Numeric types accept bounds
    pub fn is_numeric(&self) -> bool {
        matches!(self, ParamType::Integer | ParamType::Float)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::Boolean => "boolean",
            ParamType::Integer => "integer",
            ParamType::Float => "float",
            ParamType::String => "string",
            ParamType::Enum => "enum",
            ParamType::Object => "object",
            ParamType::Array => "array",
            ParamType::Null => "null",
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
