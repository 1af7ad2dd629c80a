//! Operations over groups of devices
//!
//! Every device runs as its own future. A device that fails or hangs only
//! affects its own entry in the report.
//!
//! Each device is bounded by a deadline long enough for its slowest
//! legitimate run (every request reaching the HTTP timeout), unless
//! `batch.per_device_timeout_ms` fixes one. A device still working at the
//! deadline is reported as [`RelayError::Unfinished`], never as unreachable.
//!
//! Reports are keyed by device id. A device id listed more than once is
//! handled once, at its first occurrence.

use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::time::Duration;

use futures::future::join_all;
use relay_core::{Device, DeviceRegistry, RelayError, RelayResult};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::service::ParameterService;

/// One device's share of a group operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeviceResult {
    pub fn ok(value: Option<Value>) -> Self {
        Self {
            success: true,
            value,
            error: None,
        }
    }

    pub fn failed(error: impl std::fmt::Display) -> Self {
        Self {
            success: false,
            value: None,
            error: Some(error.to_string()),
        }
    }
}

/// Per-device results of a group operation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupReport {
    pub results: BTreeMap<String, DeviceResult>,
}

impl GroupReport {
    pub fn get(&self, device_id: &str) -> Option<&DeviceResult> {
        self.results.get(device_id)
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn succeeded(&self) -> usize {
        self.results.values().filter(|r| r.success).count()
    }

    /// Ids of devices that failed
    pub fn failed(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|(_, r)| !r.success)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// `"N/M succeeded"`
    pub fn summary(&self) -> String {
        format!("{}/{} succeeded", self.succeeded(), self.total())
    }
}

impl std::fmt::Display for GroupReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.summary())
    }
}

impl FromIterator<(String, DeviceResult)> for GroupReport {
    fn from_iter<I: IntoIterator<Item = (String, DeviceResult)>>(iter: I) -> Self {
        Self {
            results: iter.into_iter().collect(),
        }
    }
}

impl ParameterService {
    /// Run `fut` under the configured deadline, or `budget` when none is set
    async fn bounded<T, F>(&self, device_id: &str, budget: Duration, fut: F) -> RelayResult<T>
    where
        F: Future<Output = RelayResult<T>>,
    {
        let limit = self.config().batch.per_device_timeout().unwrap_or(budget);
        tokio::time::timeout(limit, fut)
            .await
            .unwrap_or_else(|_| {
                Err(RelayError::Unfinished {
                    device_id: device_id.to_string(),
                    reason: format!("no result within {:?}", limit),
                })
            })
    }

    /// Read one parameter from every device
    pub async fn get_parameter_for_group(&self, devices: &[Device], name: &str) -> GroupReport {
        let budget = self.config().write_budget();
        let tasks = distinct(devices).into_iter().map(|device| async move {
            let read = self.get(device, name, false);
            let result = match self.bounded(&device.id, budget, read).await {
                Ok(Some(value)) => DeviceResult::ok(Some(value)),
                Ok(None) => DeviceResult::failed(RelayError::ParameterNotFound(name.to_string())),
                Err(e) => DeviceResult::failed(e),
            };
            (device.id.clone(), result)
        });
        let report: GroupReport = join_all(tasks).await.into_iter().collect();
        info!(parameter = name, summary = %report, "Group read finished");
        report
    }

    /// Write one parameter on every device
    pub async fn set_parameter_for_group(
        &self,
        devices: &[Device],
        name: &str,
        value: Value,
        auto_restart: bool,
    ) -> GroupReport {
        let budget = self.config().write_budget();
        let tasks = distinct(devices).into_iter().map(|device| {
            let value = value.clone();
            async move {
                let write = self.set(device, name, value, auto_restart);
                let result = match self.bounded(&device.id, budget, write).await {
                    Ok(outcome) => DeviceResult::ok(outcome.response),
                    Err(e) => {
                        warn!(device_id = %device.id, parameter = name, error = %e, "Group write failed");
                        DeviceResult::failed(e)
                    }
                };
                (device.id.clone(), result)
            }
        });
        let report: GroupReport = join_all(tasks).await.into_iter().collect();
        info!(parameter = name, summary = %report, "Group write finished");
        report
    }

    /// Discover many devices, at most `discovery.max_concurrency` at a time
    pub async fn discover_many(&self, devices: &[Device]) -> GroupReport {
        let permits = Semaphore::new(self.config().discovery.max_concurrency.max(1));
        let permits = &permits;
        let budget = self.config().discovery_budget();
        let tasks = distinct(devices).into_iter().map(|device| async move {
            let result = match permits.acquire().await {
                Ok(_permit) => match self.bounded(&device.id, budget, self.discover(device)).await {
                    Ok(capability) => DeviceResult::ok(Some(json!({
                        "device_type": capability.device_type,
                        "parameters": capability.parameters.len(),
                    }))),
                    Err(e) => DeviceResult::failed(e),
                },
                Err(e) => DeviceResult::failed(e),
            };
            (device.id.clone(), result)
        });
        let report: GroupReport = join_all(tasks).await.into_iter().collect();
        info!(summary = %report, "Group discovery finished");
        report
    }

    /// [`get_parameter_for_group`](Self::get_parameter_for_group) for device ids
    pub async fn get_parameter_for_ids(
        &self,
        registry: &dyn DeviceRegistry,
        ids: &[String],
        name: &str,
    ) -> GroupReport {
        let (devices, mut missing) = lookup_devices(registry, ids).await;
        let found = self.get_parameter_for_group(&devices, name).await;
        missing.results.extend(found.results);
        missing
    }

    /// [`set_parameter_for_group`](Self::set_parameter_for_group) for device ids
    pub async fn set_parameter_for_ids(
        &self,
        registry: &dyn DeviceRegistry,
        ids: &[String],
        name: &str,
        value: Value,
        auto_restart: bool,
    ) -> GroupReport {
        let (devices, mut missing) = lookup_devices(registry, ids).await;
        let found = self
            .set_parameter_for_group(&devices, name, value, auto_restart)
            .await;
        missing.results.extend(found.results);
        missing
    }
}

/// First occurrence of every device id, in input order
fn distinct(devices: &[Device]) -> Vec<&Device> {
    let mut seen = HashSet::new();
    devices
        .iter()
        .filter(|device| {
            let first = seen.insert(device.id.as_str());
            if !first {
                debug!(device_id = %device.id, "Device listed twice, handling it once");
            }
            first
        })
        .collect()
}

/// Split ids into known devices and a report of the ones that are not
async fn lookup_devices(registry: &dyn DeviceRegistry, ids: &[String]) -> (Vec<Device>, GroupReport) {
    let mut devices = Vec::new();
    let mut missing = GroupReport::default();
    let mut seen = HashSet::new();
    for id in ids.iter().filter(|id| seen.insert(id.as_str())) {
        match registry.get(id).await {
            Ok(Some(device)) => devices.push(device),
            Ok(None) => {
                missing
                    .results
                    .insert(id.clone(), DeviceResult::failed(format!("unknown device {}", id)));
            }
            Err(e) => {
                missing.results.insert(id.clone(), DeviceResult::failed(e));
            }
        }
    }
    (devices, missing)
}
