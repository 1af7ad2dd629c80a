//! End-to-end tests for the smart-relay parameter layer
//!
//! The tests drive [`relay_service::ParameterService`] through the real
//! reqwest transport against fake devices served by axum on local ports:
//!
//! - [`FakePlug`]: a Gen1 plug with `/shelly`, `/settings`, `/status`,
//!   `/relay/0` and `/reboot`
//! - [`FakePlus`]: a Gen2 device answering JSON-RPC on `/rpc`
//!
//! # Running Tests
//!
//! ```bash
//! RUST_LOG=relay_service=debug cargo test -p relay-tests
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use relay_client::testing::TestDevice;
use serde_json::{json, Map, Value};

/// Install a fmt subscriber honoring `RUST_LOG`; safe to call from every test
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relay_service=debug,relay_discovery=info".into()),
        )
        .with_test_writer()
        .try_init();
}

/// Shared state of a fake device
#[derive(Clone, Default)]
pub struct DeviceState {
    inner: Arc<Mutex<Value>>,
    output: Arc<Mutex<bool>>,
    reboots: Arc<Mutex<usize>>,
}

impl DeviceState {
    fn new(initial: Value) -> Self {
        Self {
            inner: Arc::new(Mutex::new(initial)),
            output: Arc::default(),
            reboots: Arc::default(),
        }
    }

    /// Current value at a top-level key
    pub fn get(&self, key: &str) -> Value {
        self.inner.lock()[key].clone()
    }

    /// Current document
    pub fn snapshot(&self) -> Value {
        self.inner.lock().clone()
    }

    /// Relay output of a Gen1 device
    pub fn output(&self) -> bool {
        *self.output.lock()
    }

    pub fn reboots(&self) -> usize {
        *self.reboots.lock()
    }
}

/// Gen1 query values as the firmware parses them
fn parse_gen1(raw: &str) -> Value {
    match raw {
        "true" | "on" => Value::Bool(true),
        "false" | "off" => Value::Bool(false),
        other => other
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(other.to_string())),
    }
}

/// A Gen1 plug served over HTTP
pub struct FakePlug {
    pub device: TestDevice,
    pub settings: DeviceState,
}

impl FakePlug {
    pub async fn start(settings: Value) -> std::io::Result<Self> {
        let state = DeviceState::new(settings);
        let router = Router::new()
            .route(
                "/shelly",
                get(|| async { Json(json!({"type": "SHPLG-S", "num_outputs": 1, "fw": "20230913"})) }),
            )
            .route(
                "/settings",
                get(
                    |State(state): State<DeviceState>,
                     Query(query): Query<HashMap<String, String>>| async move {
                        let mut settings = state.inner.lock();
                        for (key, raw) in &query {
                            if let Some(slot) = settings.get_mut(key.as_str()) {
                                *slot = parse_gen1(raw);
                            }
                        }
                        Json(settings.clone())
                    },
                ),
            )
            .route(
                "/status",
                get(|| async { Json(json!({"uptime": 4242, "meters": [{"power": 11.5}]})) }),
            )
            .route(
                "/relay/0",
                get(
                    |State(state): State<DeviceState>,
                     Query(query): Query<HashMap<String, String>>| async move {
                        let mut output = state.output.lock();
                        match query.get("turn").map(String::as_str) {
                            Some("on") => *output = true,
                            Some("off") => *output = false,
                            Some("toggle") => *output = !*output,
                            _ => {}
                        }
                        Json(json!({"ison": *output}))
                    },
                ),
            )
            .route(
                "/reboot",
                get(|State(state): State<DeviceState>| async move {
                    *state.reboots.lock() += 1;
                    Json(json!({"ok": true}))
                }),
            )
            .with_state(state.clone());

        Ok(Self {
            device: TestDevice::start(router).await?,
            settings: state,
        })
    }

    pub fn host(&self) -> String {
        self.device.host()
    }
}

fn merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                merge(target.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

fn rpc_error(id: Value, code: i64, message: String) -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({"id": id, "error": {"code": code, "message": message}})),
    )
}

/// A Gen2 device answering JSON-RPC
///
/// The configuration document is keyed by component (`sys`, `switch:0`).
/// `Shelly.SetConfig` merges its `config` into the `sys` component.
pub struct FakePlus {
    pub device: TestDevice,
    pub config: DeviceState,
}

impl FakePlus {
    pub async fn start(config: Value) -> std::io::Result<Self> {
        let state = DeviceState::new(config);
        let router = Router::new()
            .route("/rpc", post(Self::handle))
            .with_state(state.clone());
        Ok(Self {
            device: TestDevice::start(router).await?,
            config: state,
        })
    }

    async fn handle(
        State(state): State<DeviceState>,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        let id = body["id"].clone();
        let params = &body["params"];
        let method = body["method"].as_str().unwrap_or_default().to_string();

        let result = match method.as_str() {
            "Shelly.GetDeviceInfo" => json!({"id": "shellyplus2pm-a8032ab1", "app": "Plus2PM", "gen": 2}),
            "Shelly.GetConfig" => state.snapshot(),
            "Shelly.GetStatus" => json!({"sys": {"uptime": 77}, "switch:0": {"output": false}}),
            "Sys.GetConfig" => state.get("sys"),
            "Shelly.SetConfig" => {
                let mut config = state.inner.lock();
                let sys = match config.as_object_mut() {
                    Some(components) => components
                        .entry("sys")
                        .or_insert_with(|| Value::Object(Map::new())),
                    None => return rpc_error(id, -103, "bad state".to_string()),
                };
                merge(sys, &params["config"]);
                json!({"restart_required": false})
            }
            "Shelly.Reboot" => {
                *state.reboots.lock() += 1;
                Value::Null
            }
            other => return rpc_error(id, -114, format!("Method {} failed: No handler", other)),
        };
        (StatusCode::OK, Json(json!({"id": id, "result": result})))
    }

    pub fn host(&self) -> String {
        self.device.host()
    }
}
