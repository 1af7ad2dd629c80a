//! Parameter definitions

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ParamError, ParamResult};
use crate::types::ParamType;

/// Where a parameter lives on a Gen1 device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gen1Mapping {
    /// Settings endpoint, e.g. "/settings" or "/settings/relay/0"
    #[serde(default = "default_gen1_endpoint")]
    pub endpoint: String,
    /// Query key the firmware uses for this parameter
    pub property: String,
}

fn default_gen1_endpoint() -> String {
    "/settings".to_string()
}

/// Where a parameter lives on a Gen2+ device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gen2Mapping {
    /// Setter method, e.g. "Sys.SetConfig"
    pub method: String,
    /// Component key inside `Shelly.GetConfig`, e.g. "sys" or "switch:0"
    pub component: String,
    /// Dotted path inside the component config, e.g. "device.eco_mode"
    pub property: String,
}

impl Gen2Mapping {
    /// Full dotted path from the root of `Shelly.GetConfig`
    pub fn config_path(&self) -> String {
        relay_core::path::join(&self.component, &self.property)
    }
}

/// Definition of a canonical parameter
///
/// The canonical name is the key in the catalog document and is filled in on
/// load, so it is not repeated in the serialized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDefinition {
    #[serde(default, skip_serializing)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "type", default)]
    pub param_type: ParamType,

    #[serde(default)]
    pub read_only: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,

    /// Allowed values for enum parameters
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    /// Device must reboot before the new value takes effect
    #[serde(default)]
    pub requires_restart: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gen1: Option<Gen1Mapping>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gen2: Option<Gen2Mapping>,
}

impl ParameterDefinition {
    /// Create a writable definition with no encodings
    pub fn new(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            description: None,
            param_type,
            read_only: false,
            min_value: None,
            max_value: None,
            enum_values: Vec::new(),
            unit: None,
            requires_restart: false,
            group: None,
            gen1: None,
            gen2: None,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn with_bounds(mut self, min: f64, max: f64) -> Self {
        self.min_value = Some(min);
        self.max_value = Some(max);
        self
    }

    pub fn with_enum_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn requires_restart(mut self) -> Self {
        self.requires_restart = true;
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_gen1(mut self, endpoint: impl Into<String>, property: impl Into<String>) -> Self {
        self.gen1 = Some(Gen1Mapping {
            endpoint: endpoint.into(),
            property: property.into(),
        });
        self
    }

    pub fn with_gen2(
        mut self,
        method: impl Into<String>,
        component: impl Into<String>,
        property: impl Into<String>,
    ) -> Self {
        self.gen2 = Some(Gen2Mapping {
            method: method.into(),
            component: component.into(),
            property: property.into(),
        });
        self
    }

    /// Human-readable label
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    /// Check the definition is internally consistent
    pub fn check(&self) -> ParamResult<()> {
        let invalid = |reason: &str| ParamError::InvalidDefinition {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.name.trim().is_empty() {
            return Err(invalid("empty name"));
        }
        if self.param_type == ParamType::Enum && self.enum_values.is_empty() {
            return Err(invalid("enum type requires enum_values"));
        }
        if let (Some(min), Some(max)) = (self.min_value, self.max_value) {
            if min > max {
                return Err(invalid("min_value is above max_value"));
            }
        }
        Ok(())
    }

    /// Check a value without converting it
    pub fn validate(&self, value: &Value) -> ParamResult<()> {
        self.coerce(value).map(|_| ())
    }

    /// Convert a caller-supplied value to this definition's type
    ///
    /// Strings from command lines and query strings are accepted where they
    /// parse unambiguously: `"on"` for a boolean, `"42"` for an integer.
    /// Bounds and enum membership are enforced on the converted value.
    ///
    /// ```
    /// # use relay_params::{ParameterDefinition, ParamType};
    /// # use serde_json::json;
    /// let def = ParameterDefinition::new("max_power", ParamType::Integer).with_bounds(0.0, 3500.0);
    /// assert_eq!(def.coerce(&json!("1500")).unwrap(), json!(1500));
    /// assert!(def.coerce(&json!(4000)).is_err());
    /// ```
    pub fn coerce(&self, value: &Value) -> ParamResult<Value> {
        match self.param_type {
            ParamType::Boolean => coerce_bool(value)
                .map(Value::Bool)
                .ok_or_else(|| self.mismatch(value)),
            ParamType::Integer => {
                let n = coerce_i64(value).ok_or_else(|| self.mismatch(value))?;
                self.check_bounds(n as f64)?;
                Ok(Value::from(n))
            }
            ParamType::Float => {
                let f = coerce_f64(value).ok_or_else(|| self.mismatch(value))?;
                self.check_bounds(f)?;
                Ok(Value::from(f))
            }
            ParamType::String => match value {
                Value::String(_) => Ok(value.clone()),
                Value::Bool(_) | Value::Number(_) => Ok(Value::String(value.to_string())),
                _ => Err(self.mismatch(value)),
            },
            ParamType::Enum => {
                let raw = match value {
                    Value::String(s) => s.trim().to_string(),
                    Value::Bool(_) | Value::Number(_) => value.to_string(),
                    _ => return Err(self.mismatch(value)),
                };
                self.enum_values
                    .iter()
                    .find(|allowed| allowed.eq_ignore_ascii_case(&raw))
                    .map(|allowed| Value::String(allowed.clone()))
                    .ok_or_else(|| {
                        ParamError::invalid_value(
                            &self.name,
                            format!("'{}' is not one of [{}]", raw, self.enum_values.join(", ")),
                        )
                    })
            }
            ParamType::Object if value.is_object() => Ok(value.clone()),
            ParamType::Array if value.is_array() => Ok(value.clone()),
            ParamType::Object | ParamType::Array => Err(self.mismatch(value)),
            ParamType::Null => Ok(value.clone()),
        }
    }

    fn mismatch(&self, value: &Value) -> ParamError {
        ParamError::invalid_value(
            &self.name,
            format!("expected {}, got {}", self.param_type, value),
        )
    }

    fn check_bounds(&self, n: f64) -> ParamResult<()> {
        if let Some(min) = self.min_value {
            if n < min {
                return Err(ParamError::invalid_value(
                    &self.name,
                    format!("{} is below minimum {}", n, min),
                ));
            }
        }
        if let Some(max) = self.max_value {
            if n > max {
                return Err(ParamError::invalid_value(
                    &self.name,
                    format!("{} is above maximum {}", n, max),
                ));
            }
        }
        Ok(())
    }
}

fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "on" | "1" | "yes" | "enabled" => Some(true),
            "false" | "off" | "0" | "no" | "disabled" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn coerce_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| integral(n.as_f64()?)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| integral(s.parse::<f64>().ok()?))
        }
        _ => None,
    }
}

fn coerce_f64(value: &Value) -> Option<f64> {
    let f = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    f.is_finite().then_some(f)
}

fn integral(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0).then_some(f as i64)
}
