//! Parameter service
//!
//! The public face of the layer: read and write canonical parameters on any
//! device without knowing its generation, endpoint, path, or wire encoding.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::Context;
use parking_lot::RwLock;
use relay_client::{DeviceTransport, HttpTransport, TransportError};
use relay_core::{path, Device, RelayError, RelayResult};
use relay_discovery::flatten::{flatten_into, LeafSource};
use relay_discovery::probe::component_prefix;
use relay_discovery::{
    device_type_for, leaves, set_config_method, ClassificationRules, DiscoveryEngine,
};
use relay_params::{
    decode_from_gen1, encode_for_gen1, encode_for_gen2, gen1_value, ParamType, ParameterCatalog,
    ParameterDefinition,
};
use relay_schema::{CapabilityParameter, CapabilityStore, DeviceCapability, YamlCapabilityFiles};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::config::ServiceConfig;
use crate::outcome::{WriteOutcome, WritePhase};
use crate::protocol::{
    parse_switch, DeviceProtocol, Gen1Protocol, ReadTarget, RpcProtocol, SettingWrite, Source,
    SwitchCommand, WriteAction, WritePlan,
};

/// One row of [`ParameterService::list_all`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterListing {
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub description: String,
    pub api: String,
    pub parameter_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    pub read_only: bool,
    /// Current value, when the device reported one
    pub value: Option<Value>,
}

impl ParameterListing {
    fn new(parameter: &CapabilityParameter, value: Option<Value>) -> Self {
        Self {
            param_type: parameter.param_type,
            description: parameter.description.clone(),
            api: parameter.api.clone(),
            parameter_path: parameter.parameter_path.clone(),
            component: parameter.component.clone(),
            read_only: parameter.read_only,
            value,
        }
    }
}

/// A name resolved against the capability and the catalog
struct Resolved {
    canonical: String,
    definition: Option<ParameterDefinition>,
    entry: Option<CapabilityParameter>,
}

impl Resolved {
    fn read_only(&self) -> bool {
        self.entry.as_ref().is_some_and(|e| e.read_only)
            || self.definition.as_ref().is_some_and(|d| d.read_only)
    }
}

/// Gen1 settings endpoint for a recorded API ("settings/relay/0")
fn gen1_endpoint(api: &str) -> String {
    let api = api.trim_start_matches('/');
    if api.starts_with("settings") {
        format!("/{}", api)
    } else {
        "/settings".to_string()
    }
}

/// Flatten a document into `scratch`, keeping the first value seen per key
fn absorb(
    scratch: &mut DeviceCapability,
    values: &mut HashMap<String, Value>,
    body: &Value,
    source: LeafSource<'_>,
    rules: &ClassificationRules,
) {
    for (leaf_path, value) in leaves(body) {
        let key = path::flat_key(&path::join(source.key_prefix, &leaf_path));
        values.entry(key).or_insert_with(|| value.clone());
    }
    flatten_into(scratch, body, source, rules);
}

/// Get/set/discover/list over both device generations
pub struct ParameterService {
    catalog: Arc<ParameterCatalog>,
    store: Arc<CapabilityStore>,
    engine: DiscoveryEngine,
    gen1: Gen1Protocol,
    rpc: RpcProtocol,
    /// Capabilities by device id, filled by `discover` and by store lookups
    capabilities: RwLock<HashMap<String, Arc<DeviceCapability>>>,
    config: ServiceConfig,
}

impl ParameterService {
    pub fn new(
        catalog: Arc<ParameterCatalog>,
        store: Arc<CapabilityStore>,
        transport: Arc<dyn DeviceTransport>,
        config: ServiceConfig,
    ) -> Self {
        let engine = DiscoveryEngine::new(transport.clone(), store.clone(), config.discovery.clone())
            .with_rules(config.classification.clone());
        let gen1 = Gen1Protocol::new(
            transport.clone(),
            config.gen1.strategies.clone(),
            config.gen1.routes.clone(),
            config.verification.clone(),
        );
        let rpc = RpcProtocol::new(transport, config.verification.clone());
        Self {
            catalog,
            store,
            engine,
            gen1,
            rpc,
            capabilities: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Build a service from configuration alone
    ///
    /// Loads (or initializes) the catalog file, opens the capability
    /// directory and creates an HTTP transport with the configured timeouts.
    pub fn open(config: ServiceConfig) -> anyhow::Result<Self> {
        let catalog = ParameterCatalog::load_or_init(&config.paths.catalog_file)
            .with_context(|| format!("loading {}", config.paths.catalog_file.display()))?;
        let files = YamlCapabilityFiles::new(&config.paths.capability_dir);
        let store = CapabilityStore::open(Arc::new(files))
            .with_context(|| format!("loading {}", config.paths.capability_dir.display()))?;
        let transport =
            HttpTransport::with_config(config.http.timeout(), config.http.connect_timeout())
                .context("creating HTTP client")?;
        info!(
            parameters = catalog.len(),
            capabilities = store.len(),
            "Parameter service ready"
        );
        Ok(Self::new(
            Arc::new(catalog),
            Arc::new(store),
            Arc::new(transport),
            config,
        ))
    }

    pub fn catalog(&self) -> &ParameterCatalog {
        &self.catalog
    }

    pub fn store(&self) -> &CapabilityStore {
        &self.store
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn protocol_for(&self, device: &Device) -> RelayResult<&dyn DeviceProtocol> {
        if device.generation.is_gen1() {
            Ok(&self.gen1)
        } else if device.generation.is_rpc() {
            Ok(&self.rpc)
        } else {
            Err(RelayError::UnsupportedGeneration(format!(
                "{} ({})",
                device.generation, device.id
            )))
        }
    }

    fn host<'a>(&self, device: &'a Device) -> RelayResult<&'a str> {
        device
            .host()
            .ok_or_else(|| RelayError::unreachable(&device.id, "no IP address"))
    }

    /// Capability for a device: cached, else resolved through the store
    pub fn capability_for(&self, device: &Device) -> Option<Arc<DeviceCapability>> {
        if let Some(capability) = self.capabilities.read().get(&device.id) {
            return Some(capability.clone());
        }
        let capability = Arc::new(self.store.resolve(device)?);
        debug!(
            device_id = %device.id,
            device_type = %capability.device_type,
            "Resolved capability from store"
        );
        self.capabilities
            .write()
            .insert(device.id.clone(), capability.clone());
        Some(capability)
    }

    /// Drop a device's cached capability; returns whether one was cached
    pub fn forget(&self, device_id: &str) -> bool {
        self.capabilities.write().remove(device_id).is_some()
    }

    fn resolve(&self, device: &Device, name: &str) -> Resolved {
        let canonical = self.catalog.to_standard_name(name);
        let entry = self.capability_for(device).and_then(|capability| {
            capability
                .parameter_details(name)
                .or_else(|| capability.parameter_details(&canonical))
                .cloned()
        });
        Resolved {
            definition: self.catalog.get(&canonical),
            canonical,
            entry,
        }
    }

    /// Where to read a resolved parameter on this device
    fn read_target(&self, device: &Device, resolved: &Resolved) -> ReadTarget {
        if let Some(entry) = &resolved.entry {
            if entry.api.is_empty() {
                return ReadTarget::defaults(&entry.parameter_path, entry.component.clone());
            }
            let source = Source::new(&entry.api).with_component(entry.component.clone());
            return ReadTarget::explicit(source, &entry.parameter_path);
        }

        let definition = resolved.definition.as_ref();
        if device.generation.is_gen1() {
            if let Some(gen1) = definition.and_then(|d| d.gen1.as_ref()) {
                let source = Source::new(gen1.endpoint.trim_start_matches('/'));
                return ReadTarget::explicit(source, &gen1.property).with_fallback();
            }
            return ReadTarget::defaults(self.catalog.to_gen1_name(&resolved.canonical), None);
        }
        if let Some(gen2) = definition.and_then(|d| d.gen2.as_ref()) {
            let source = Source::new(&gen2.method).with_component(Some(gen2.component.clone()));
            return ReadTarget::explicit(source, &gen2.property).with_fallback();
        }
        ReadTarget::defaults(&resolved.canonical, None)
    }

    /// Read a parameter
    ///
    /// `Ok(None)` means the device answered but has no such value. Only an
    /// unreachable device is an error. With `log_warnings` off, misses are
    /// logged at debug level, for callers sweeping many names.
    #[instrument(skip(self, device), fields(device_id = %device.id))]
    pub async fn get(
        &self,
        device: &Device,
        name: &str,
        log_warnings: bool,
    ) -> RelayResult<Option<Value>> {
        let host = self.host(device)?;
        let protocol = self.protocol_for(device)?;

        let (target, definition) = match parse_switch(name) {
            Some(id) => (protocol.switch_target(id), None),
            None => {
                let resolved = self.resolve(device, name);
                (self.read_target(device, &resolved), resolved.definition)
            }
        };

        match protocol.read(host, &target).await {
            Ok(Some(value)) if device.generation.is_gen1() => {
                Ok(Some(decode_from_gen1(definition.as_ref(), &value)))
            }
            Ok(Some(value)) => Ok(Some(value)),
            Ok(None) => {
                if log_warnings {
                    warn!(parameter = name, path = %target.path, "Parameter not found on device");
                } else {
                    debug!(parameter = name, path = %target.path, "Parameter not found on device");
                }
                Ok(None)
            }
            Err(e) => Err(RelayError::unreachable(&device.id, e.to_string())),
        }
    }

    /// Build the write plan; refuses read-only parameters and invalid values
    fn plan_write(&self, device: &Device, name: &str, value: Value) -> RelayResult<(WritePlan, bool)> {
        let protocol = self.protocol_for(device)?;

        if let Some(id) = parse_switch(name) {
            let command = SwitchCommand::from_value(&value).ok_or_else(|| RelayError::InvalidValue {
                parameter: name.to_string(),
                reason: format!("expected on, off, toggle or a boolean, got {}", value),
            })?;
            let plan = WritePlan {
                device_id: device.id.clone(),
                parameter: name.to_string(),
                expected: command.state().map(Value::Bool).unwrap_or(Value::Null),
                action: WriteAction::Switch { id, command },
                verify: command.state().map(|_| protocol.switch_target(id)),
            };
            return Ok((plan, false));
        }

        let resolved = self.resolve(device, name);
        if resolved.read_only() {
            return Err(RelayError::ReadOnlyParameter(name.to_string()));
        }

        let definition = resolved.definition.as_ref();
        let value = match definition {
            Some(def) => encode_for_gen2(def, &def.coerce(&value)?),
            None => value,
        };
        let encoded = match definition {
            Some(def) => encode_for_gen1(def, &value),
            None => gen1_value(&resolved.canonical, &value),
        };

        let gen1_name = self.catalog.to_gen1_name(&resolved.canonical);
        let (endpoint, key, config_path) = match (&resolved.entry, definition) {
            (Some(entry), _) => {
                let key = match path::segments(&entry.parameter_path).as_slice() {
                    [single] => single.to_string(),
                    _ => gen1_name,
                };
                (gen1_endpoint(&entry.api), key, entry.parameter_path.clone())
            }
            (None, Some(def)) => {
                let (endpoint, key) = match &def.gen1 {
                    Some(gen1) => (gen1.endpoint.clone(), gen1.property.clone()),
                    None => ("/settings".to_string(), gen1_name),
                };
                let config_path = match &def.gen2 {
                    Some(gen2) => gen2.property.clone(),
                    None => resolved.canonical.clone(),
                };
                (endpoint, key, config_path)
            }
            (None, None) => ("/settings".to_string(), gen1_name, resolved.canonical.clone()),
        };

        let requires_restart = definition.is_some_and(|d| d.requires_restart);
        let plan = WritePlan {
            device_id: device.id.clone(),
            parameter: resolved.canonical.clone(),
            expected: value.clone(),
            action: WriteAction::Setting(SettingWrite {
                name: name.to_string(),
                value,
                endpoint,
                key,
                encoded,
                config_path,
            }),
            verify: Some(self.read_target(device, &resolved)),
        };
        Ok((plan, requires_restart))
    }

    /// Write a parameter
    ///
    /// Read-only parameters are refused before anything is sent. After a
    /// successful write of a parameter that needs a restart, the device is
    /// rebooted when `auto_restart` is set; a failed reboot is reported as a
    /// warning on the outcome.
    #[instrument(skip(self, device, value), fields(device_id = %device.id))]
    pub async fn set(
        &self,
        device: &Device,
        name: &str,
        value: Value,
        auto_restart: bool,
    ) -> RelayResult<WriteOutcome> {
        debug!(phase = %WritePhase::Resolving, parameter = name, "Resolving write");
        let (plan, requires_restart) = self.plan_write(device, name, value)?;
        let host = self.host(device)?;
        let protocol = self.protocol_for(device)?;

        let mut outcome = match protocol.write(host, &plan).await {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!(phase = %WritePhase::Failed, parameter = %plan.parameter, error = %e, "Write failed");
                return Err(e);
            }
        };
        debug!(phase = %WritePhase::Succeeded, parameter = %plan.parameter, "Write succeeded");
        info!(
            parameter = %plan.parameter,
            value = %outcome.value,
            strategy = %outcome.strategy,
            "Parameter written"
        );

        if auto_restart && (requires_restart || outcome.restart_required) {
            match protocol.reboot(host).await {
                Ok(()) => outcome.restarted = true,
                Err(e) => {
                    warn!(parameter = %plan.parameter, error = %e, "Reboot after write failed");
                    outcome.warnings.push(RelayError::Protocol(format!(
                        "reboot after writing {} failed: {}",
                        plan.parameter, e
                    )));
                }
            }
        }
        Ok(outcome)
    }

    /// Discover a device's capability, save it, and cache it for this device
    pub async fn discover(&self, device: &Device) -> RelayResult<Arc<DeviceCapability>> {
        let capability = Arc::new(self.engine.discover(device).await?);
        self.capabilities
            .write()
            .insert(device.id.clone(), capability.clone());
        Ok(capability)
    }

    /// Every known parameter with its current value
    ///
    /// With a capability, its parameters are listed and each distinct API is
    /// read once. Without one, the generation's status and settings
    /// documents are flattened with the discovery classification rules.
    #[instrument(skip(self, device), fields(device_id = %device.id))]
    pub async fn list_all(
        &self,
        device: &Device,
        include_readonly: bool,
    ) -> RelayResult<BTreeMap<String, ParameterListing>> {
        let host = self.host(device)?;
        let protocol = self.protocol_for(device)?;
        let unreachable = |e: TransportError| RelayError::unreachable(&device.id, e.to_string());

        let capability = match self.capability_for(device) {
            Some(capability) => capability,
            None => {
                return self
                    .list_undeclared(device, host, protocol, include_readonly)
                    .await
                    .map_err(unreachable)
            }
        };

        let mut documents: HashMap<Source, Option<Value>> = HashMap::new();
        let mut listing = BTreeMap::new();
        for (name, parameter) in &capability.parameters {
            if parameter.read_only && !include_readonly {
                continue;
            }
            let value = if parameter.api.is_empty() {
                let target =
                    ReadTarget::defaults(&parameter.parameter_path, parameter.component.clone());
                protocol.read(host, &target).await.map_err(unreachable)?
            } else {
                let source = Source::new(&parameter.api).with_component(parameter.component.clone());
                if !documents.contains_key(&source) {
                    let document = protocol.fetch(host, &source).await.map_err(unreachable)?;
                    documents.insert(source.clone(), document);
                }
                documents
                    .get(&source)
                    .and_then(Option::as_ref)
                    .and_then(|doc| path::lookup(doc, &parameter.parameter_path))
                    .cloned()
            };
            listing.insert(name.clone(), ParameterListing::new(parameter, value));
        }
        Ok(listing)
    }

    async fn list_undeclared(
        &self,
        device: &Device,
        host: &str,
        protocol: &dyn DeviceProtocol,
        include_readonly: bool,
    ) -> Result<BTreeMap<String, ParameterListing>, TransportError> {
        let rules = self.engine.rules();
        let mut scratch = DeviceCapability::new(device_type_for(device), device.generation);
        let mut values: HashMap<String, Value> = HashMap::new();

        for listing in protocol.listing_sources() {
            let Some(document) = protocol.fetch(host, &listing.source).await? else {
                continue;
            };
            if !listing.namespaced {
                let source = LeafSource {
                    api: &listing.source.api,
                    key_prefix: "",
                    component: None,
                    status: listing.status,
                };
                absorb(&mut scratch, &mut values, &document, source, rules);
                continue;
            }
            let Some(components) = document.as_object() else {
                continue;
            };
            for (component, body) in components {
                let api = if listing.status {
                    listing.source.api.clone()
                } else {
                    set_config_method(component)
                };
                let prefix = component_prefix(component);
                let source = LeafSource {
                    api: &api,
                    key_prefix: &prefix,
                    component: Some(component.as_str()),
                    status: listing.status,
                };
                absorb(&mut scratch, &mut values, body, source, rules);
            }
        }

        Ok(scratch
            .parameters
            .iter()
            .filter(|(_, p)| include_readonly || !p.read_only)
            .map(|(name, p)| {
                (
                    name.clone(),
                    ParameterListing::new(p, values.get(name).cloned()),
                )
            })
            .collect())
    }

    /// Alias of [`get`](Self::get) with warnings on
    pub async fn get_parameter(&self, device: &Device, name: &str) -> RelayResult<Option<Value>> {
        self.get(device, name, true).await
    }

    /// Alias of [`set`](Self::set)
    pub async fn set_parameter(
        &self,
        device: &Device,
        name: &str,
        value: Value,
        auto_restart: bool,
    ) -> RelayResult<WriteOutcome> {
        self.set(device, name, value, auto_restart).await
    }

    /// Alias of [`discover`](Self::discover)
    pub async fn discover_capabilities(&self, device: &Device) -> RelayResult<Arc<DeviceCapability>> {
        self.discover(device).await
    }

    /// Alias of [`list_all`](Self::list_all)
    pub async fn list_parameters(
        &self,
        device: &Device,
        include_readonly: bool,
    ) -> RelayResult<BTreeMap<String, ParameterListing>> {
        self.list_all(device, include_readonly).await
    }
}

impl std::fmt::Debug for ParameterService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterService")
            .field("catalog", &self.catalog.len())
            .field("store", &self.store)
            .field("cached_capabilities", &self.capabilities.read().len())
            .finish()
    }
}
