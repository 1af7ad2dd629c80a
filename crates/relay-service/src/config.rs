//! Service configuration
//!
//! Everything is optional; an empty document yields the defaults. Durations
//! are plain millisecond counts.
//!
//! ```toml
//! [http]
//! timeout_ms = 5000
//!
//! [verification]
//! settle_delay_ms = 2000
//!
//! [gen1]
//! strategies = ["settings_query", "form_post", "save_flag"]
//!
//! [[gen1.routes]]
//! prefix = "relay_"
//! endpoint = "/settings/relay/{index}"
//! indexed = true
//!
//! [paths]
//! catalog_file = "/etc/relayd/parameters.yaml"
//! capability_dir = "/var/lib/relayd/capabilities"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use relay_core::{RelayError, RelayResult};
use relay_discovery::{ClassificationRules, DiscoveryConfig};
use serde::{Deserialize, Serialize};

use crate::strategy::{ComponentRoute, Gen1Strategy};

/// Top-level service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Device HTTP client settings
    pub http: HttpConfig,
    /// Read-after-write verification
    pub verification: VerificationConfig,
    /// Capability discovery tuning
    pub discovery: DiscoveryConfig,
    /// Read-only keyword overrides
    pub classification: ClassificationRules,
    /// Gen1 write fallback chain
    pub gen1: Gen1Config,
    /// Group operation settings
    pub batch: BatchConfig,
    /// On-disk locations
    pub paths: PathsConfig,
}

impl ServiceConfig {
    /// Parse a TOML document
    pub fn from_toml(text: &str) -> RelayResult<Self> {
        toml::from_str(text).map_err(|e| RelayError::Config(e.to_string()))
    }

    /// Read and parse a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("parsing config file {}", path.display()))
    }

    /// Worst case of one get or set when every request runs to the HTTP timeout
    ///
    /// A Gen1 write may walk the whole strategy chain, each step being a write,
    /// the settle delay and a read-back, followed by a reboot request.
    pub fn write_budget(&self) -> Duration {
        let timeout = self.http.timeout();
        let per_strategy = self.verification.settle_delay() + timeout * 2;
        let strategies = u32::try_from(self.gen1.strategies.len().max(1)).unwrap_or(u32::MAX);
        per_strategy.saturating_mul(strategies) + timeout
    }

    /// Worst case of one discovery when every probe runs to the HTTP timeout
    pub fn discovery_budget(&self) -> Duration {
        let probes = u32::try_from(self.discovery.max_probes()).unwrap_or(u32::MAX);
        self.http.timeout().saturating_mul(probes)
    }
}

/// Device HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Whole-request timeout in milliseconds
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
    /// TCP connect timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
}

fn default_timeout() -> u64 {
    5000
}

fn default_connect_timeout() -> u64 {
    3000
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout(),
            connect_timeout_ms: default_connect_timeout(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Read-after-write verification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Read the value back after a successful write
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Wait before reading back, in milliseconds (Gen1 applies settings lazily)
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_settle_delay() -> u64 {
    2000
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            settle_delay_ms: default_settle_delay(),
        }
    }
}

impl VerificationConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Gen1 write fallback chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gen1Config {
    /// Strategies tried in order until one succeeds
    #[serde(default = "Gen1Strategy::default_order")]
    pub strategies: Vec<Gen1Strategy>,
    /// Parameter-name prefixes routed to component settings endpoints
    #[serde(default = "ComponentRoute::defaults")]
    pub routes: Vec<ComponentRoute>,
}

impl Default for Gen1Config {
    fn default() -> Self {
        Self {
            strategies: Gen1Strategy::default_order(),
            routes: ComponentRoute::defaults(),
        }
    }
}

/// Group operation settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Fixed upper bound on one device's share of a group operation, in
    /// milliseconds. Unset means the bound is derived from the HTTP timeout,
    /// the settle delay and the amount of work (see
    /// [`ServiceConfig::write_budget`] and [`ServiceConfig::discovery_budget`]).
    #[serde(default)]
    pub per_device_timeout_ms: Option<u64>,
}

impl BatchConfig {
    pub fn per_device_timeout(&self) -> Option<Duration> {
        self.per_device_timeout_ms.map(Duration::from_millis)
    }
}

/// On-disk locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Parameter catalog YAML; written with the built-in table when missing
    #[serde(default = "default_catalog_file")]
    pub catalog_file: PathBuf,
    /// Directory of per-device-type capability YAML files
    #[serde(default = "default_capability_dir")]
    pub capability_dir: PathBuf,
}

fn default_catalog_file() -> PathBuf {
    PathBuf::from("config/parameters.yaml")
}

fn default_capability_dir() -> PathBuf {
    PathBuf::from("config/capabilities")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            catalog_file: default_catalog_file(),
            capability_dir: default_capability_dir(),
        }
    }
}
