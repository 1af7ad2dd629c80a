//! Read-only classification of discovered leaves

use std::collections::BTreeSet;

use relay_core::path;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Telemetry and identity fields devices report but never accept writes for
const DEFAULT_READ_ONLY_KEYWORDS: &[&str] = &[
    "uptime",
    "voltage",
    "power",
    "apower",
    "aenergy",
    "energy",
    "current",
    "temperature",
    "temp",
    "tC",
    "tF",
    "overtemperature",
    "overpower",
    "counters",
    "total",
    "mac",
    "serial",
    "id",
    "model",
    "gen",
    "app",
    "fw",
    "fw_id",
    "firmware",
    "ver",
    "version",
    "rssi",
    "ram_free",
    "ram_size",
    "fs_free",
    "fs_size",
    "time",
    "unixtime",
    "has_update",
];

/// Keyword vocabulary deciding which discovered parameters are read-only
///
/// A leaf is read-only when any of its path segments is a read-only keyword
/// (and not listed as writable), when it came from a status endpoint, or
/// when it is an array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationRules {
    pub read_only_keywords: BTreeSet<String>,
    /// Segments that stay writable even if also listed as read-only
    pub writable_keywords: BTreeSet<String>,
}

impl Default for ClassificationRules {
    fn default() -> Self {
        Self {
            read_only_keywords: DEFAULT_READ_ONLY_KEYWORDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            writable_keywords: BTreeSet::new(),
        }
    }
}

impl ClassificationRules {
    /// Add keywords to the read-only vocabulary
    pub fn with_read_only<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.read_only_keywords
            .extend(keywords.into_iter().map(Into::into));
        self
    }

    /// Force segments to be treated as writable
    pub fn with_writable<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.writable_keywords
            .extend(keywords.into_iter().map(Into::into));
        self
    }

    fn is_keyword(&self, segment: &str) -> bool {
        self.read_only_keywords.contains(segment) && !self.writable_keywords.contains(segment)
    }

    /// Classify one leaf
    pub fn is_read_only(&self, leaf_path: &str, from_status: bool, value: &Value) -> bool {
        from_status
            || value.is_array()
            || path::segments(leaf_path)
                .into_iter()
                .any(|segment| self.is_keyword(segment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keyword_segments() {
        let rules = ClassificationRules::default();
        assert!(rules.is_read_only("uptime", false, &json!(12)));
        assert!(rules.is_read_only("device.mac", false, &json!("AABB")));
        assert!(!rules.is_read_only("max_power", false, &json!(2000)));
        assert!(!rules.is_read_only("device.eco_mode", false, &json!(true)));
    }

    #[test]
    fn test_status_and_arrays() {
        let rules = ClassificationRules::default();
        assert!(rules.is_read_only("ison", true, &json!(true)));
        assert!(rules.is_read_only("schedule_rules", false, &json!([])));
    }

    #[test]
    fn test_overrides() {
        let rules = ClassificationRules::default()
            .with_read_only(["hostname"])
            .with_writable(["time"]);
        assert!(rules.is_read_only("device.hostname", false, &json!("x")));
        assert!(!rules.is_read_only("time", false, &json!("12:00")));
    }

    #[test]
    fn test_deserialize_partial() {
        let rules: ClassificationRules =
            serde_json::from_value(json!({"writable_keywords": ["id"]})).unwrap();
        assert!(rules.read_only_keywords.contains("uptime"));
        assert!(!rules.is_read_only("id", false, &json!(0)));
    }
}
