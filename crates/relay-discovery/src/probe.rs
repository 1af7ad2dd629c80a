//! Probe plans for each device generation

use relay_core::path;

/// Gen1 endpoints whose keys are not prefixed
const GEN1_ROOT_ENDPOINTS: &[&str] = &["/settings", "/status", "/shelly"];

/// Auxiliary Gen1 settings endpoints probed after the main ones
const GEN1_AUX_ENDPOINTS: &[&str] = &[
    "/settings/ap",
    "/settings/sta",
    "/settings/login",
    "/settings/cloud",
];

/// A Gen1 endpoint to GET
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gen1Endpoint {
    pub path: String,
}

impl Gen1Endpoint {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        };
        Self { path }
    }

    /// Key in `DeviceCapability::apis` and value of `CapabilityParameter::api`
    pub fn api(&self) -> &str {
        self.path.trim_start_matches('/')
    }

    /// Key prefix for parameters found here ("relay_0" for "/settings/relay/0")
    pub fn key_prefix(&self) -> String {
        if GEN1_ROOT_ENDPOINTS.contains(&self.path.as_str()) {
            return String::new();
        }
        let parts: Vec<&str> = self.path.split('/').filter(|s| !s.is_empty()).collect();
        match parts.as_slice() {
            [] => String::new(),
            [only] => only.to_string(),
            [_, rest @ ..] => rest.join("_"),
        }
    }

    /// Status and identity endpoints only report
    pub fn is_status(&self) -> bool {
        self.path == "/shelly" || self.path == "/status" || self.path.starts_with("/status/")
    }
}

/// Gen1 endpoints probed after `/shelly`, in order
pub fn gen1_plan(outputs: usize, meters: usize, extra: &[String]) -> Vec<Gen1Endpoint> {
    let mut plan = vec![
        Gen1Endpoint::new("/settings"),
        Gen1Endpoint::new("/status"),
        Gen1Endpoint::new("/settings/actions"),
    ];
    plan.extend((0..outputs).map(|i| Gen1Endpoint::new(format!("/settings/relay/{}", i))));
    plan.extend((0..meters).map(|i| Gen1Endpoint::new(format!("/status/meters/{}", i))));
    plan.extend(GEN1_AUX_ENDPOINTS.iter().map(|p| Gen1Endpoint::new(*p)));
    plan.extend(extra.iter().map(|p| Gen1Endpoint::new(p.clone())));
    plan
}

/// What an RPC probe returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcKind {
    /// Device identity, read-only
    Info,
    /// Writable configuration; parameters record the matching `SetConfig`
    Config,
    /// Runtime status, read-only
    Status,
}

/// How a probe's result is laid out
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcLayout {
    /// Result is keyed by component ("sys", "switch:0")
    Namespaced,
    /// Result is one component's object
    Component(String),
    /// Result is a flat object under a fixed key prefix
    Prefixed(&'static str),
}

/// A single RPC probe
#[derive(Debug, Clone, PartialEq)]
pub struct RpcProbe {
    pub method: String,
    pub params: serde_json::Value,
    pub kind: RpcKind,
    pub layout: RpcLayout,
}

impl RpcProbe {
    fn new(method: &str, kind: RpcKind, layout: RpcLayout) -> Self {
        Self {
            method: method.to_string(),
            params: serde_json::json!({}),
            kind,
            layout,
        }
    }

    fn component(method: &str, kind: RpcKind, component: &str) -> Self {
        Self::new(method, kind, RpcLayout::Component(component.to_string()))
    }
}

/// Fixed (non-indexed) RPC probes, in order
///
/// Configuration is probed before status so writable entries claim shared keys.
pub fn rpc_fixed_plan() -> Vec<RpcProbe> {
    use RpcKind::*;
    vec![
        RpcProbe::new("Shelly.GetDeviceInfo", Info, RpcLayout::Prefixed("device_info")),
        RpcProbe::new("Shelly.GetConfig", Config, RpcLayout::Namespaced),
        RpcProbe::new("Shelly.GetStatus", Status, RpcLayout::Namespaced),
        RpcProbe::component("Sys.GetConfig", Config, "sys"),
        RpcProbe::component("Sys.GetStatus", Status, "sys"),
        RpcProbe::component("Cloud.GetConfig", Config, "cloud"),
        RpcProbe::component("Cloud.GetStatus", Status, "cloud"),
        RpcProbe::component("MQTT.GetConfig", Config, "mqtt"),
        RpcProbe::component("WiFi.GetConfig", Config, "wifi"),
        RpcProbe::component("BLE.GetConfig", Config, "ble"),
    ]
}

/// Component families that exist in several instances
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexedFamily {
    pub namespace: &'static str,
    pub component: &'static str,
    pub has_status: bool,
}

pub const INDEXED_FAMILIES: &[IndexedFamily] = &[
    IndexedFamily {
        namespace: "Switch",
        component: "switch",
        has_status: true,
    },
    IndexedFamily {
        namespace: "Light",
        component: "light",
        has_status: true,
    },
    IndexedFamily {
        namespace: "Input",
        component: "input",
        has_status: false,
    },
];

impl IndexedFamily {
    pub fn config_probe(&self, id: usize) -> RpcProbe {
        self.probe("GetConfig", RpcKind::Config, id)
    }

    pub fn status_probe(&self, id: usize) -> RpcProbe {
        self.probe("GetStatus", RpcKind::Status, id)
    }

    fn probe(&self, verb: &str, kind: RpcKind, id: usize) -> RpcProbe {
        RpcProbe {
            method: format!("{}.{}", self.namespace, verb),
            params: serde_json::json!({ "id": id }),
            kind,
            layout: RpcLayout::Component(format!("{}:{}", self.component, id)),
        }
    }
}

/// RPC namespace owning a component key ("switch:0" -> "Switch", "wifi" -> "WiFi")
pub fn component_namespace(component: &str) -> String {
    let base = component.split(':').next().unwrap_or(component);
    match base {
        "sys" => "Sys".to_string(),
        "wifi" => "WiFi".to_string(),
        "mqtt" => "MQTT".to_string(),
        "ble" => "BLE".to_string(),
        "ws" => "WS".to_string(),
        "plugs_ui" => "PLUGS_UI".to_string(),
        other => {
            let mut chars = other.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }
    }
}

/// `SetConfig` method for a component key
pub fn set_config_method(component: &str) -> String {
    format!("{}.SetConfig", component_namespace(component))
}

/// Instance id of an indexed component key ("switch:1" -> 1)
pub fn component_id(component: &str) -> Option<u64> {
    component.split_once(':')?.1.parse().ok()
}

/// Key prefix for a component's parameters ("switch:0" -> "switch_0")
pub fn component_prefix(component: &str) -> String {
    path::flat_key(component)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gen1_key_prefixes() {
        assert_eq!(Gen1Endpoint::new("/settings").key_prefix(), "");
        assert_eq!(Gen1Endpoint::new("/shelly").key_prefix(), "");
        assert_eq!(Gen1Endpoint::new("/settings/relay/0").key_prefix(), "relay_0");
        assert_eq!(Gen1Endpoint::new("/status/meters/1").key_prefix(), "meters_1");
        assert_eq!(Gen1Endpoint::new("settings/ap").key_prefix(), "ap");
        assert_eq!(Gen1Endpoint::new("/ota").key_prefix(), "ota");
    }

    #[test]
    fn test_gen1_api_and_status() {
        let ep = Gen1Endpoint::new("/settings/relay/0");
        assert_eq!(ep.api(), "settings/relay/0");
        assert!(!ep.is_status());
        assert!(Gen1Endpoint::new("/status/meters/0").is_status());
        assert!(Gen1Endpoint::new("/shelly").is_status());
        assert!(!Gen1Endpoint::new("/statusx").is_status());
    }

    #[test]
    fn test_gen1_plan_order() {
        let plan: Vec<_> = gen1_plan(2, 1, &["/settings/night_mode".to_string()])
            .into_iter()
            .map(|e| e.path)
            .collect();
        assert_eq!(
            plan,
            vec![
                "/settings",
                "/status",
                "/settings/actions",
                "/settings/relay/0",
                "/settings/relay/1",
                "/status/meters/0",
                "/settings/ap",
                "/settings/sta",
                "/settings/login",
                "/settings/cloud",
                "/settings/night_mode",
            ]
        );
    }

    #[test]
    fn test_component_names() {
        assert_eq!(set_config_method("sys"), "Sys.SetConfig");
        assert_eq!(set_config_method("wifi"), "WiFi.SetConfig");
        assert_eq!(set_config_method("switch:0"), "Switch.SetConfig");
        assert_eq!(set_config_method("mqtt"), "MQTT.SetConfig");
        assert_eq!(set_config_method("cover:1"), "Cover.SetConfig");
        assert_eq!(component_id("switch:1"), Some(1));
        assert_eq!(component_id("sys"), None);
        assert_eq!(component_prefix("switch:0"), "switch_0");
    }

    #[test]
    fn test_indexed_probe() {
        let probe = INDEXED_FAMILIES[0].config_probe(1);
        assert_eq!(probe.method, "Switch.GetConfig");
        assert_eq!(probe.params, serde_json::json!({"id": 1}));
        assert_eq!(probe.layout, RpcLayout::Component("switch:1".to_string()));
    }
}
