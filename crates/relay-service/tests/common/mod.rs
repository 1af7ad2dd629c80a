//! Shared fixtures for relay-service tests

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use relay_client::testing::MockTransport;
use relay_client::{HttpMethod, HttpReply};
use relay_core::{Device, Generation};
use relay_params::{ParamType, ParameterCatalog};
use relay_schema::{CapabilityParameter, CapabilityStore, DeviceCapability, MemoryCapabilityFiles};
use relay_service::{ParameterService, ServiceConfig};
use serde_json::{json, Value};

pub const PLUG_HOST: &str = "10.0.0.5";
pub const PLUS_HOST: &str = "10.0.0.7";

/// Service over a mock transport with verification but no settle delay
pub fn service(mock: &Arc<MockTransport>, capabilities: Vec<DeviceCapability>) -> ParameterService {
    service_with(mock, capabilities, ServiceConfig::default())
}

pub fn service_with(
    mock: &Arc<MockTransport>,
    capabilities: Vec<DeviceCapability>,
    mut config: ServiceConfig,
) -> ParameterService {
    config.verification.settle_delay_ms = 0;
    let store = Arc::new(CapabilityStore::new(Arc::new(MemoryCapabilityFiles::new())));
    for capability in capabilities {
        store.save(capability).unwrap();
    }
    ParameterService::new(
        Arc::new(ParameterCatalog::builtin()),
        store,
        mock.clone(),
        config,
    )
}

pub fn plug() -> Device {
    Device::new("shellyplug-s-C8C9A3", Generation::Gen1)
        .with_ip(PLUG_HOST)
        .with_raw_type("SHPLG-S")
}

pub fn plus() -> Device {
    Device::new("shellyplus2pm-a8032ab1", Generation::Gen2)
        .with_ip(PLUS_HOST)
        .with_raw_app("Plus2PM")
}

pub fn plug_capability() -> DeviceCapability {
    let mut capability = DeviceCapability::new("SHPLG-S", Generation::Gen1);
    capability.add_parameter(
        "eco_mode",
        CapabilityParameter::new(ParamType::Boolean, "settings", "eco_mode"),
    );
    capability.add_parameter(
        "uptime",
        CapabilityParameter::new(ParamType::Integer, "status", "uptime").read_only(true),
    );
    capability.add_mapping("SHPLG-S");
    capability
}

pub fn plus_capability() -> DeviceCapability {
    let mut capability = DeviceCapability::new("Plus2PM", Generation::Gen2);
    capability.add_parameter(
        "eco_mode",
        CapabilityParameter::new(ParamType::Boolean, "Sys.SetConfig", "device.eco_mode")
            .with_component("sys"),
    );
    capability.add_mapping("Plus2PM");
    capability
}

fn parse_query_value(raw: &str) -> Value {
    match raw {
        "true" | "on" => json!(true),
        "false" | "off" => json!(false),
        other => other
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| json!(other)),
    }
}

/// A Gen1 `/settings` endpoint backed by a JSON object
///
/// `GET /settings?k=v` updates known keys and echoes the document. With
/// `accept_writes` off every write is refused with a 500.
pub struct FakeSettings {
    pub state: Arc<Mutex<Value>>,
}

impl FakeSettings {
    pub fn install(mock: &MockTransport, initial: Value, accept_writes: bool) -> Self {
        let state = Arc::new(Mutex::new(initial));
        let shared = state.clone();
        mock.on(move |_, req| {
            if req.path != "/settings" && !req.path.starts_with("/settings/") {
                return None;
            }
            let is_write = !req.query.is_empty() || req.method == HttpMethod::Post;
            if is_write && !accept_writes {
                return Some(Ok(HttpReply::new(500, "")));
            }
            if req.path != "/settings" {
                return Some(Ok(HttpReply::new(404, "")));
            }
            let mut settings = shared.lock();
            for (key, raw) in &req.query {
                if let Some(slot) = settings.get_mut(key) {
                    *slot = parse_query_value(raw);
                }
            }
            Some(Ok(HttpReply::json(&settings)))
        });
        Self { state }
    }

    pub fn get(&self, key: &str) -> Value {
        self.state.lock()[key].clone()
    }
}
