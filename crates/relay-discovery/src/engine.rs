//! Capability discovery engine
//!
//! Probes a live device, walks every JSON response it gets back, and infers
//! a [`DeviceCapability`] from the leaves. Individual probe failures are
//! expected (not every model has every endpoint) and only logged.

use std::sync::Arc;

use relay_client::{rpc, DeviceTransport, HttpRequest, TransportError};
use relay_core::{path, Device, RelayError, RelayResult};
use relay_params::ParamType;
use relay_schema::{ApiInfo, CapabilityParameter, CapabilityStore, DeviceCapability};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::flatten::{flatten_into, sketch, LeafSource, SKETCH_DEPTH};
use crate::identity::{device_type_for, seed_mappings};
use crate::probe::{
    component_prefix, gen1_plan, rpc_fixed_plan, set_config_method, Gen1Endpoint, RpcKind,
    RpcLayout, RpcProbe, INDEXED_FAMILIES,
};
use crate::rules::ClassificationRules;

/// Discovery tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Devices discovered at once by batch discovery
    pub max_concurrency: usize,
    /// Upper bound on relay/meter/switch instances probed per device
    pub max_component_instances: usize,
    /// Additional Gen1 endpoints to probe after the built-in ones
    pub extra_gen1_paths: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            max_component_instances: 4,
            extra_gen1_paths: Vec::new(),
        }
    }
}

impl DiscoveryConfig {
    /// Most requests a single discovery can send, whichever generation it probes
    pub fn max_probes(&self) -> usize {
        let instances = self.max_component_instances;
        // `/shelly` comes before the plan
        let gen1 = 1 + gen1_plan(instances, instances, &self.extra_gen1_paths).len();
        let rpc = rpc_fixed_plan().len()
            + INDEXED_FAMILIES
                .iter()
                .map(|family| instances * if family.has_status { 2 } else { 1 })
                .sum::<usize>();
        gen1.max(rpc)
    }
}

/// Outcome bookkeeping across the probes of one discovery
#[derive(Debug, Default)]
struct ProbeLog {
    replies: usize,
    failures: usize,
    last_error: Option<String>,
}

impl ProbeLog {
    fn replied(&mut self) {
        self.replies += 1;
    }

    fn failed(&mut self, error: &TransportError) {
        self.failures += 1;
        self.last_error = Some(error.to_string());
    }
}

/// Infers capabilities from live devices and saves them to the store
pub struct DiscoveryEngine {
    transport: Arc<dyn DeviceTransport>,
    store: Arc<CapabilityStore>,
    config: DiscoveryConfig,
    rules: ClassificationRules,
}

impl DiscoveryEngine {
    pub fn new(
        transport: Arc<dyn DeviceTransport>,
        store: Arc<CapabilityStore>,
        config: DiscoveryConfig,
    ) -> Self {
        Self {
            transport,
            store,
            config,
            rules: ClassificationRules::default(),
        }
    }

    /// Replace the read-only classification vocabulary
    pub fn with_rules(mut self, rules: ClassificationRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    pub fn rules(&self) -> &ClassificationRules {
        &self.rules
    }

    /// Probe a device, save the inferred capability, and return it
    #[instrument(skip(self, device), fields(device_id = %device.id, generation = %device.generation))]
    pub async fn discover(&self, device: &Device) -> RelayResult<DeviceCapability> {
        let capability = self.infer(device).await?;
        self.store.save(capability.clone())?;
        info!(
            device_type = %capability.device_type,
            parameters = capability.parameters.len(),
            apis = capability.apis.len(),
            "Discovered device capability"
        );
        Ok(capability)
    }

    /// Probe a device and infer its capability without saving it
    pub async fn infer(&self, device: &Device) -> RelayResult<DeviceCapability> {
        let host = device
            .host()
            .ok_or_else(|| RelayError::unreachable(&device.id, "no IP address"))?;

        let mut capability = DeviceCapability::new(device_type_for(device), device.generation);
        for seed in seed_mappings(device) {
            capability.add_mapping(&seed);
        }

        let mut log = ProbeLog::default();
        if device.generation.is_gen1() {
            self.probe_gen1(host, &mut capability, &mut log).await;
        } else if device.generation.is_rpc() {
            self.probe_rpc(host, &mut capability, &mut log).await;
        } else {
            return Err(RelayError::UnsupportedGeneration(
                device.generation.to_string(),
            ));
        }

        if log.replies == 0 {
            return Err(RelayError::unreachable(
                &device.id,
                log.last_error
                    .unwrap_or_else(|| "no probe reached the device".to_string()),
            ));
        }
        if capability.parameters.is_empty() {
            return Err(RelayError::DiscoveryFailed {
                device_id: device.id.clone(),
                reason: format!(
                    "{} probes answered, {} failed, no parameters inferred",
                    log.replies, log.failures
                ),
            });
        }
        Ok(capability)
    }

    async fn probe_gen1(&self, host: &str, capability: &mut DeviceCapability, log: &mut ProbeLog) {
        let max = self.config.max_component_instances;
        let shelly = Gen1Endpoint::new("/shelly");
        let info = self.fetch_gen1(host, &shelly, log).await;

        let count = |key: &str| {
            info.as_ref()
                .and_then(|body| body.get(key))
                .and_then(Value::as_u64)
                .map(|n| n as usize)
                .unwrap_or(1)
                .min(max)
        };
        let (outputs, meters) = (count("num_outputs"), count("num_meters"));
        if let Some(body) = &info {
            self.absorb_gen1(capability, &shelly, body);
        }

        for endpoint in gen1_plan(outputs, meters, &self.config.extra_gen1_paths) {
            if let Some(body) = self.fetch_gen1(host, &endpoint, log).await {
                self.absorb_gen1(capability, &endpoint, &body);
            }
        }
    }

    async fn fetch_gen1(&self, host: &str, endpoint: &Gen1Endpoint, log: &mut ProbeLog) -> Option<Value> {
        match self
            .transport
            .send(host, &HttpRequest::get(endpoint.path.as_str()))
            .await
        {
            Ok(reply) => {
                log.replied();
                if !reply.is_ok() {
                    debug!(path = %endpoint.path, status = reply.status, "Probe not supported");
                    return None;
                }
                match reply.body_json() {
                    Some(body) if body.is_object() => Some(body),
                    _ => {
                        debug!(path = %endpoint.path, "Probe returned no JSON object");
                        None
                    }
                }
            }
            Err(e) => {
                debug!(path = %endpoint.path, error = %e, "Probe failed");
                log.failed(&e);
                None
            }
        }
    }

    fn absorb_gen1(&self, capability: &mut DeviceCapability, endpoint: &Gen1Endpoint, body: &Value) {
        let prefix = endpoint.key_prefix();
        let added = flatten_into(
            capability,
            body,
            LeafSource {
                api: endpoint.api(),
                key_prefix: &prefix,
                component: None,
                status: endpoint.is_status(),
            },
            &self.rules,
        );
        capability.add_api(
            endpoint.api(),
            ApiInfo {
                description: format!("GET {}", endpoint.path),
                response_structure: sketch(body, SKETCH_DEPTH),
            },
        );
        debug!(path = %endpoint.path, added, "Absorbed probe");
    }

    async fn probe_rpc(&self, host: &str, capability: &mut DeviceCapability, log: &mut ProbeLog) {
        let mut sys_config: Option<Value> = None;

        for probe in rpc_fixed_plan() {
            let Some(result) = self.call_rpc(host, &probe, log).await else {
                continue;
            };
            match probe.method.as_str() {
                "Sys.GetConfig" => sys_config = Some(result.clone()),
                "Shelly.GetConfig" if sys_config.is_none() => {
                    sys_config = result.get("sys").cloned();
                }
                _ => {}
            }
            self.absorb_rpc(capability, &probe, &result);
        }

        for family in INDEXED_FAMILIES {
            for id in 0..self.config.max_component_instances {
                let probe = family.config_probe(id);
                let Some(result) = self.call_rpc(host, &probe, log).await else {
                    break;
                };
                self.absorb_rpc(capability, &probe, &result);

                if family.has_status {
                    let probe = family.status_probe(id);
                    if let Some(result) = self.call_rpc(host, &probe, log).await {
                        self.absorb_rpc(capability, &probe, &result);
                    }
                }
            }
        }

        // eco_mode has a canonical home regardless of what flattening named it
        if let Some(eco) = sys_config
            .as_ref()
            .and_then(|sys| path::lookup(sys, "device.eco_mode"))
        {
            capability.parameters.insert(
                "eco_mode".to_string(),
                CapabilityParameter::new(ParamType::of(eco), "Sys.SetConfig", "device.eco_mode")
                    .with_component("sys")
                    .with_description("Eco mode"),
            );
        }
    }

    async fn call_rpc(&self, host: &str, probe: &RpcProbe, log: &mut ProbeLog) -> Option<Value> {
        match rpc::call(self.transport.as_ref(), host, &probe.method, probe.params.clone()).await {
            Ok(result) if result.is_object() => {
                log.replied();
                Some(result)
            }
            Ok(_) => {
                log.replied();
                debug!(method = %probe.method, "Probe returned no JSON object");
                None
            }
            Err(e) => {
                if e.is_unreachable() {
                    log.failed(&e);
                } else {
                    // The device answered, just not with a result
                    log.replied();
                }
                debug!(method = %probe.method, error = %e, "Probe failed");
                None
            }
        }
    }

    fn absorb_rpc(&self, capability: &mut DeviceCapability, probe: &RpcProbe, result: &Value) {
        let status = probe.kind != RpcKind::Config;
        let mut added = 0;
        match &probe.layout {
            RpcLayout::Namespaced => {
                if let Value::Object(components) = result {
                    for (component, body) in components {
                        let api = match probe.kind {
                            RpcKind::Config => set_config_method(component),
                            _ => probe.method.clone(),
                        };
                        let prefix = component_prefix(component);
                        added += flatten_into(
                            capability,
                            body,
                            LeafSource {
                                api: &api,
                                key_prefix: &prefix,
                                component: Some(component.as_str()),
                                status,
                            },
                            &self.rules,
                        );
                    }
                }
            }
            RpcLayout::Component(component) => {
                let api = match probe.kind {
                    RpcKind::Config => set_config_method(component),
                    _ => probe.method.clone(),
                };
                let prefix = component_prefix(component);
                added += flatten_into(
                    capability,
                    result,
                    LeafSource {
                        api: &api,
                        key_prefix: &prefix,
                        component: Some(component.as_str()),
                        status,
                    },
                    &self.rules,
                );
            }
            RpcLayout::Prefixed(prefix) => {
                added += flatten_into(
                    capability,
                    result,
                    LeafSource {
                        api: &probe.method,
                        key_prefix: *prefix,
                        component: None,
                        status,
                    },
                    &self.rules,
                );
            }
        }

        capability
            .apis
            .entry(probe.method.clone())
            .or_insert_with(|| ApiInfo {
                description: format!("RPC {}", probe.method),
                response_structure: sketch(result, SKETCH_DEPTH),
            });
        debug!(method = %probe.method, params = %probe.params, added, "Absorbed probe");
    }
}
