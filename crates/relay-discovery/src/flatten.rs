//! Turning JSON responses into capability parameters

use relay_core::path;
use relay_params::ParamType;
use relay_schema::{CapabilityParameter, DeviceCapability};
use serde_json::{Map, Value};

use crate::rules::ClassificationRules;

/// Depth at which response sketches stop descending
pub const SKETCH_DEPTH: usize = 3;

/// Where a response came from
#[derive(Debug, Clone, Copy)]
pub struct LeafSource<'a> {
    /// Recorded as the parameter's `api`
    pub api: &'a str,
    /// Prepended to every key ("relay_0", "switch:0"); empty for none
    pub key_prefix: &'a str,
    /// RPC component the paths are relative to
    pub component: Option<&'a str>,
    /// Everything from a status endpoint is read-only
    pub status: bool,
}

/// Collect `(dotted path, leaf)` pairs
///
/// Objects recurse. An array whose first element is an object recurses into
/// index 0, once; deeper arrays and arrays of scalars are leaves.
pub fn leaves(value: &Value) -> Vec<(String, &Value)> {
    let mut out = Vec::new();
    walk(value, "", false, &mut out);
    out
}

fn walk<'a>(value: &'a Value, prefix: &str, in_array: bool, out: &mut Vec<(String, &'a Value)>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                walk(child, &path::join(prefix, key), in_array, out);
            }
        }
        Value::Array(items) if !in_array && items.first().is_some_and(Value::is_object) => {
            walk(&items[0], &path::join(prefix, "0"), true, out);
        }
        _ if prefix.is_empty() => {}
        _ => out.push((prefix.to_string(), value)),
    }
}

/// Add every leaf of `body` to the capability; returns how many were new
///
/// Existing keys are left untouched, so the first source to produce a key wins.
pub fn flatten_into(
    capability: &mut DeviceCapability,
    body: &Value,
    source: LeafSource<'_>,
    rules: &ClassificationRules,
) -> usize {
    let mut added = 0;
    for (leaf_path, value) in leaves(body) {
        let key = path::flat_key(&path::join(source.key_prefix, &leaf_path));
        let mut parameter = CapabilityParameter::new(ParamType::of(value), source.api, &leaf_path)
            .read_only(rules.is_read_only(&leaf_path, source.status, value))
            .with_description(format!("{} from {}", leaf_path, source.api));
        if let Some(component) = source.component {
            parameter = parameter.with_component(component);
        }
        if capability.add_parameter(key, parameter) {
            added += 1;
        }
    }
    added
}

/// Structural sketch of a response: leaves replaced by their type name
///
/// ```
/// # use relay_discovery::flatten::sketch;
/// # use serde_json::json;
/// let body = json!({"eco_mode": true, "relays": [{"ison": false}]});
/// assert_eq!(
///     sketch(&body, 3),
///     json!({"eco_mode": "boolean", "relays": [{"ison": "boolean"}]})
/// );
/// ```
pub fn sketch(value: &Value, depth: usize) -> Value {
    match value {
        Value::Object(map) if depth > 0 => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), sketch(v, depth - 1)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) if depth > 0 && !items.is_empty() => {
            Value::Array(vec![sketch(&items[0], depth - 1)])
        }
        other => Value::String(ParamType::of(other).to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use relay_core::Generation;
    use serde_json::json;

    #[test]
    fn test_leaves_walks_objects_and_first_array_item() {
        let body = json!({
            "eco_mode": false,
            "device": {"hostname": "plug"},
            "relays": [{"default_state": "off", "schedule_rules": []}, {"default_state": "on"}],
            "tags": ["a", "b"],
        });
        let mut paths: Vec<_> = leaves(&body).into_iter().map(|(p, _)| p).collect();
        paths.sort();
        assert_eq!(
            paths,
            vec![
                "device.hostname",
                "eco_mode",
                "relays.0.default_state",
                "relays.0.schedule_rules",
                "tags",
            ]
        );
    }

    #[test]
    fn test_nested_array_of_objects_is_leaf() {
        let body = json!({"a": [{"b": [{"c": 1}]}]});
        let found = leaves(&body);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, "a.0.b");
        assert!(found[0].1.is_array());
    }

    #[test]
    fn test_flatten_prefixes_and_classifies() {
        let rules = ClassificationRules::default();
        let mut cap = DeviceCapability::new("SHPLG-S", Generation::Gen1);
        let body = json!({"default_state": "off", "ison": false, "power": 0});

        let added = flatten_into(
            &mut cap,
            &body,
            LeafSource {
                api: "settings/relay/0",
                key_prefix: "relay_0",
                component: None,
                status: false,
            },
            &rules,
        );
        assert_eq!(added, 3);

        let p = cap.parameter_details("relay_0_default_state").unwrap();
        assert_eq!(p.api, "settings/relay/0");
        assert_eq!(p.parameter_path, "default_state");
        assert_eq!(p.param_type, ParamType::String);
        assert!(!p.read_only);
        assert!(cap.parameter_details("relay_0_power").unwrap().read_only);

        // Same keys again do not overwrite
        let added = flatten_into(
            &mut cap,
            &body,
            LeafSource {
                api: "status",
                key_prefix: "relay_0",
                component: None,
                status: true,
            },
            &rules,
        );
        assert_eq!(added, 0);
        assert_eq!(cap.parameters["relay_0_default_state"].api, "settings/relay/0");
    }

    #[test]
    fn test_flatten_component_namespace() {
        let rules = ClassificationRules::default();
        let mut cap = DeviceCapability::new("Plus2PM", Generation::Gen2);
        flatten_into(
            &mut cap,
            &json!({"name": null, "auto_off_delay": 60.0}),
            LeafSource {
                api: "Switch.SetConfig",
                key_prefix: "switch:0",
                component: Some("switch:0"),
                status: false,
            },
            &rules,
        );

        let p = cap.parameter_details("switch_0_auto_off_delay").unwrap();
        assert_eq!(p.component.as_deref(), Some("switch:0"));
        assert_eq!(p.param_type, ParamType::Float);
        assert_eq!(cap.parameters["switch_0_name"].param_type, ParamType::Null);
    }

    #[test]
    fn test_sketch_truncates() {
        let body = json!({"a": {"b": {"c": {"d": 1}}}, "list": []});
        assert_eq!(
            sketch(&body, 3),
            json!({"a": {"b": {"c": "object"}}, "list": "array"})
        );
    }
}
