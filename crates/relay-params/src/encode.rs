//! Wire encoding of parameter values
//!
//! Values travel through the service as JSON; they are only turned into the
//! generation's wire form at the last step before dispatch.

use serde_json::Value;

use crate::definition::ParameterDefinition;

/// The one Gen1 boolean that the firmware expects as `true`/`false`
const LITERAL_BOOLEAN_PARAMS: &[&str] = &["eco_mode"];

/// Encode a value as a Gen1 query-string value
///
/// ```
/// # use relay_params::{encode_for_gen1, ParameterDefinition, ParamType};
/// # use serde_json::json;
/// let eco = ParameterDefinition::new("eco_mode", ParamType::Boolean);
/// let led = ParameterDefinition::new("led_status_disable", ParamType::Boolean);
/// assert_eq!(encode_for_gen1(&eco, &json!(true)), "true");
/// assert_eq!(encode_for_gen1(&led, &json!(true)), "on");
/// ```
pub fn encode_for_gen1(def: &ParameterDefinition, value: &Value) -> String {
    let value = def.coerce(value).unwrap_or_else(|_| value.clone());
    gen1_value(&def.name, &value)
}

/// Encode a value for a Gen1 parameter that has no catalog definition
pub fn gen1_value(name: &str, value: &Value) -> String {
    match value {
        Value::Bool(b) if LITERAL_BOOLEAN_PARAMS.contains(&name) => b.to_string(),
        Value::Bool(b) => on_off(*b).to_string(),
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// `on`/`off` spelling of a boolean
pub fn on_off(b: bool) -> &'static str {
    if b {
        "on"
    } else {
        "off"
    }
}

/// Encode a value for a Gen2+ RPC payload
///
/// RPC payloads are typed JSON, so this only normalizes the value to the
/// definition's type (`"1500"` becomes `1500` for an integer).
pub fn encode_for_gen2(def: &ParameterDefinition, value: &Value) -> Value {
    def.coerce(value).unwrap_or_else(|_| value.clone())
}

/// Decode a Gen1 reply value into a canonical JSON value
///
/// Gen1 replies carry typed JSON for most settings but some firmware
/// reports booleans as `"on"`/`"off"` strings.
pub fn decode_from_gen1(def: Option<&ParameterDefinition>, value: &Value) -> Value {
    match def {
        Some(def) => def.coerce(value).unwrap_or_else(|_| value.clone()),
        None => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ParamType;
    use serde_json::json;

    #[test]
    fn test_gen1_boolean_asymmetry() {
        let eco = ParameterDefinition::new("eco_mode", ParamType::Boolean);
        assert_eq!(encode_for_gen1(&eco, &json!(false)), "false");
        assert_eq!(encode_for_gen1(&eco, &json!("on")), "true");

        let mqtt = ParameterDefinition::new("mqtt_enable", ParamType::Boolean);
        assert_eq!(encode_for_gen1(&mqtt, &json!(false)), "off");
        assert_eq!(encode_for_gen1(&mqtt, &json!("true")), "on");
    }

    #[test]
    fn test_gen1_scalars() {
        let def = ParameterDefinition::new("max_power", ParamType::Integer);
        assert_eq!(encode_for_gen1(&def, &json!(2000)), "2000");
        assert_eq!(encode_for_gen1(&def, &json!("2000")), "2000");

        let def = ParameterDefinition::new("name", ParamType::String);
        assert_eq!(encode_for_gen1(&def, &json!("Living room")), "Living room");

        assert_eq!(gen1_value("anything", &Value::Null), "");
        assert_eq!(gen1_value("eco_mode", &json!(true)), "true");
        assert_eq!(gen1_value("led_status_disable", &json!(false)), "off");
    }

    #[test]
    fn test_gen2_keeps_native_types() {
        let def = ParameterDefinition::new("eco_mode", ParamType::Boolean);
        assert_eq!(encode_for_gen2(&def, &json!("on")), json!(true));

        let def = ParameterDefinition::new("max_power", ParamType::Integer);
        assert_eq!(encode_for_gen2(&def, &json!("1500")), json!(1500));

        // Uncoercible values pass through for the device to reject
        assert_eq!(encode_for_gen2(&def, &json!("lots")), json!("lots"));
    }

    #[test]
    fn test_decode_on_off_string() {
        let def = ParameterDefinition::new("led_status_disable", ParamType::Boolean);
        assert_eq!(decode_from_gen1(Some(&def), &json!("off")), json!(false));
        assert_eq!(decode_from_gen1(None, &json!("off")), json!("off"));
    }
}
