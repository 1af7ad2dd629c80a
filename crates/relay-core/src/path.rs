//! Dotted parameter paths.
//!
//! Both device generations locate a single leaf with a dotted path into a
//! JSON document (`"device.eco_mode"`, `"relays.0.ison"`). Numeric segments
//! index into arrays. These helpers centralise navigation so every call site
//! treats a missing segment the same way: as "not found", never as an error.

use serde_json::{Map, Value};

/// Split a dotted path into its non-empty segments.
///
/// ```
/// # use relay_core::path::segments;
/// assert_eq!(segments("device.eco_mode"), vec!["device", "eco_mode"]);
/// assert_eq!(segments(".a..b."), vec!["a", "b"]);
/// assert!(segments("").is_empty());
/// ```
pub fn segments(path: &str) -> Vec<&str> {
    path.split('.').filter(|s| !s.is_empty()).collect()
}

/// Navigate `value` along a dotted path.
///
/// An empty path returns the root. Numeric segments index arrays.
///
/// ```
/// # use relay_core::path::lookup;
/// # use serde_json::json;
/// let doc = json!({"device": {"eco_mode": true}, "relays": [{"ison": false}]});
/// assert_eq!(lookup(&doc, "device.eco_mode"), Some(&json!(true)));
/// assert_eq!(lookup(&doc, "relays.0.ison"), Some(&json!(false)));
/// assert_eq!(lookup(&doc, "device.missing"), None);
/// ```
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in segments(path) {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Build a nested object that places `leaf` at the dotted path.
///
/// ```
/// # use relay_core::path::nest;
/// # use serde_json::json;
/// assert_eq!(nest("device.eco_mode", json!(true)), json!({"device": {"eco_mode": true}}));
/// assert_eq!(nest("", json!(1)), json!(1));
/// ```
pub fn nest(path: &str, leaf: Value) -> Value {
    segments(path).into_iter().rev().fold(leaf, |inner, segment| {
        let mut map = Map::new();
        map.insert(segment.to_string(), inner);
        Value::Object(map)
    })
}

/// Flatten a dotted path into a parameter key (`.` and `:` become `_`).
///
/// ```
/// # use relay_core::path::flat_key;
/// assert_eq!(flat_key("sys.device.eco_mode"), "sys_device_eco_mode");
/// assert_eq!(flat_key("switch:0.name"), "switch_0_name");
/// ```
pub fn flat_key(path: &str) -> String {
    segments(path)
        .join("_")
        .chars()
        .map(|c| if c == ':' { '_' } else { c })
        .collect()
}

/// Join a prefix and a segment into a dotted path.
///
/// ```
/// # use relay_core::path::join;
/// assert_eq!(join("", "a"), "a");
/// assert_eq!(join("a", "b"), "a.b");
/// ```
pub fn join(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{}.{}", prefix, segment)
    }
}
