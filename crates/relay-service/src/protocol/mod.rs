//! Generation-specific wire dialects
//!
//! [`DeviceProtocol`] is the seam between the service and the two ways a
//! device can be spoken to: [`Gen1Protocol`] (flat HTTP settings) and
//! [`RpcProtocol`] (JSON-RPC, Gen2 and later). The service resolves names
//! and values into a [`ReadTarget`] or [`WritePlan`]; the protocol turns
//! those into requests.

mod gen1;
mod rpc;

pub use gen1::Gen1Protocol;
pub use rpc::RpcProtocol;

use async_trait::async_trait;
use relay_client::TransportError;
use relay_core::{path, RelayResult};
use serde_json::Value;
use tracing::debug;

use crate::config::VerificationConfig;
use crate::outcome::{values_match, Verification, WriteOutcome, WritePhase};

/// A document a parameter path is relative to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Source {
    /// Gen1 endpoint ("settings", "settings/relay/0") or RPC method
    pub api: String,
    /// RPC component key ("sys", "switch:0")
    pub component: Option<String>,
}

impl Source {
    pub fn new(api: impl Into<String>) -> Self {
        Self {
            api: api.into(),
            component: None,
        }
    }

    pub fn with_component(mut self, component: Option<String>) -> Self {
        self.component = component;
        self
    }
}

/// A document flattened when listing a device with no capability
#[derive(Debug, Clone)]
pub struct ListingSource {
    pub source: Source,
    /// Everything in it is read-only
    pub status: bool,
    /// Keyed by component ("sys", "switch:0") rather than flat
    pub namespaced: bool,
}

/// Where to read one value
#[derive(Debug, Clone, PartialEq)]
pub struct ReadTarget {
    /// Dotted path inside the source document
    pub path: String,
    /// Source named by the capability or catalog
    pub source: Option<Source>,
    /// Component the generation defaults should narrow to
    pub component: Option<String>,
    /// Try the generation defaults after an explicit source misses
    pub fallback: bool,
}

impl ReadTarget {
    /// Read from one named source only
    pub fn explicit(source: Source, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            component: source.component.clone(),
            source: Some(source),
            fallback: false,
        }
    }

    /// Read through the generation defaults
    pub fn defaults(path: impl Into<String>, component: Option<String>) -> Self {
        Self {
            path: path.into(),
            source: None,
            component,
            fallback: true,
        }
    }

    pub fn with_fallback(mut self) -> Self {
        self.fallback = true;
        self
    }
}

/// Switch actuation command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchCommand {
    On,
    Off,
    Toggle,
}

impl SwitchCommand {
    /// Accepts booleans and `on`/`off`/`toggle` (and `true`/`false`)
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(true) => Some(Self::On),
            Value::Bool(false) => Some(Self::Off),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "on" | "true" => Some(Self::On),
                "off" | "false" => Some(Self::Off),
                "toggle" => Some(Self::Toggle),
                _ => None,
            },
            _ => None,
        }
    }

    /// Resulting output state, unknown for a toggle
    pub fn state(&self) -> Option<bool> {
        match self {
            Self::On => Some(true),
            Self::Off => Some(false),
            Self::Toggle => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
            Self::Toggle => "toggle",
        }
    }
}

/// Parse `switch.<n>.turn` / `switch.<n>.output` (also `switch:<n>.…`)
pub fn parse_switch(name: &str) -> Option<u32> {
    let rest = name
        .strip_prefix("switch.")
        .or_else(|| name.strip_prefix("switch:"))?;
    let (id, field) = rest.split_once('.')?;
    matches!(field, "turn" | "output")
        .then(|| id.parse().ok())
        .flatten()
}

/// A settings write, pre-shaped for both generations
#[derive(Debug, Clone, PartialEq)]
pub struct SettingWrite {
    /// Parameter name routes are matched against
    pub name: String,
    /// Typed value (RPC payloads, boolean strategies)
    pub value: Value,
    /// Gen1 settings endpoint
    pub endpoint: String,
    /// Gen1 query key
    pub key: String,
    /// Gen1 wire value
    pub encoded: String,
    /// Dotted path nested into `Shelly.SetConfig`
    pub config_path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteAction {
    Setting(SettingWrite),
    Switch { id: u32, command: SwitchCommand },
}

/// Everything a protocol needs to perform one write
#[derive(Debug, Clone, PartialEq)]
pub struct WritePlan {
    pub device_id: String,
    pub parameter: String,
    /// Value the device should report afterwards (`null` when unknown)
    pub expected: Value,
    pub action: WriteAction,
    /// Where to read the value back; `None` when it cannot be
    pub verify: Option<ReadTarget>,
}

/// One device generation's wire dialect
#[async_trait]
pub trait DeviceProtocol: Send + Sync {
    fn name(&self) -> &'static str;

    /// Sources tried, in order, when no explicit source is known
    fn default_sources(&self, component: Option<&str>) -> Vec<Source>;

    /// Documents flattened to list a device that has no capability
    fn listing_sources(&self) -> Vec<ListingSource>;

    /// Where a switch's output state is read
    fn switch_target(&self, id: u32) -> ReadTarget;

    /// Fetch a source document
    ///
    /// `Ok(None)` when the device answered without a usable document;
    /// `Err` only when it could not be reached.
    async fn fetch(&self, host: &str, source: &Source) -> Result<Option<Value>, TransportError>;

    /// Read one value; a missing path segment is `Ok(None)`
    async fn read(&self, host: &str, target: &ReadTarget) -> Result<Option<Value>, TransportError> {
        let mut sources: Vec<Source> = target.source.iter().cloned().collect();
        if target.fallback {
            for source in self.default_sources(target.component.as_deref()) {
                if !sources.contains(&source) {
                    sources.push(source);
                }
            }
        }
        for source in &sources {
            let Some(doc) = self.fetch(host, source).await? else {
                continue;
            };
            if let Some(value) = path::lookup(&doc, &target.path) {
                return Ok(Some(value.clone()));
            }
            debug!(api = %source.api, path = %target.path, "Path not present in response");
        }
        Ok(None)
    }

    /// Perform a write; failure after every attempt is `WriteFailed`
    async fn write(&self, host: &str, plan: &WritePlan) -> RelayResult<WriteOutcome>;

    async fn reboot(&self, host: &str) -> Result<(), TransportError>;
}

/// Read a written value back and compare
pub(crate) async fn verify<P>(
    protocol: &P,
    host: &str,
    plan: &WritePlan,
    config: &VerificationConfig,
) -> Verification
where
    P: DeviceProtocol + ?Sized,
{
    if !config.enabled {
        return Verification::Skipped;
    }
    let Some(target) = &plan.verify else {
        return Verification::Unverifiable;
    };
    debug!(phase = %WritePhase::Verifying, parameter = %plan.parameter, "Reading back");
    if !config.settle_delay().is_zero() {
        tokio::time::sleep(config.settle_delay()).await;
    }
    match protocol.read(host, target).await {
        Ok(Some(observed)) if values_match(&plan.expected, &observed) => Verification::Matched,
        Ok(Some(observed)) => Verification::Mismatch { observed },
        Ok(None) => Verification::Unverifiable,
        Err(e) => {
            debug!(parameter = %plan.parameter, error = %e, "Read-back failed");
            Verification::Unverifiable
        }
    }
}
