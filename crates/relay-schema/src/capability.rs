//! Capability schema model

use std::collections::{BTreeMap, BTreeSet};

use relay_core::Generation;
use relay_params::ParamType;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One endpoint or RPC method a device type answers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiInfo {
    #[serde(default)]
    pub description: String,
    /// Type sketch of the response, truncated at a fixed depth
    #[serde(default)]
    pub response_structure: Value,
}

/// One parameter a device type exposes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityParameter {
    #[serde(rename = "type", default)]
    pub param_type: ParamType,
    #[serde(default)]
    pub description: String,
    /// Gen1 endpoint path ("settings", "settings/relay/0") or RPC method name
    pub api: String,
    /// Dotted path of the value inside the API response
    #[serde(default)]
    pub parameter_path: String,
    #[serde(default)]
    pub read_only: bool,
    /// RPC component key ("sys", "switch:0") the path is relative to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
}

impl CapabilityParameter {
    pub fn new(param_type: ParamType, api: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            param_type,
            description: String::new(),
            api: api.into(),
            parameter_path: path.into(),
            read_only: false,
            component: None,
        }
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Everything known about one device type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceCapability {
    /// Primary key, e.g. "SHPLG-S" or "Plus2PM"
    pub device_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub generation: Generation,
    #[serde(default)]
    pub apis: BTreeMap<String, ApiInfo>,
    #[serde(default)]
    pub parameters: BTreeMap<String, CapabilityParameter>,
    /// Raw vendor identifiers that resolve to this device type
    #[serde(default)]
    pub type_mappings: BTreeSet<String>,
}

impl DeviceCapability {
    pub fn new(device_type: impl Into<String>, generation: Generation) -> Self {
        let device_type = device_type.into();
        Self {
            name: device_type.clone(),
            device_type,
            generation,
            apis: BTreeMap::new(),
            parameters: BTreeMap::new(),
            type_mappings: BTreeSet::new(),
        }
    }

    pub fn has_parameter(&self, name: &str) -> bool {
        self.parameters.contains_key(name)
    }

    pub fn parameter_details(&self, name: &str) -> Option<&CapabilityParameter> {
        self.parameters.get(name)
    }

    /// Add a parameter unless one with that name exists; returns whether it was added
    pub fn add_parameter(&mut self, name: impl Into<String>, parameter: CapabilityParameter) -> bool {
        match self.parameters.entry(name.into()) {
            std::collections::btree_map::Entry::Occupied(_) => false,
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(parameter);
                true
            }
        }
    }

    pub fn add_api(&mut self, api: impl Into<String>, info: ApiInfo) {
        self.apis.insert(api.into(), info);
    }

    /// Add a raw identifier; blank identifiers are ignored
    pub fn add_mapping(&mut self, identifier: &str) {
        let identifier = identifier.trim();
        if !identifier.is_empty() {
            self.type_mappings.insert(identifier.to_string());
        }
    }

    /// Identifiers this capability is indexed under (itself when it has none)
    pub fn index_keys(&self) -> Vec<String> {
        if self.type_mappings.is_empty() {
            vec![self.device_type.clone()]
        } else {
            self.type_mappings.iter().cloned().collect()
        }
    }

    /// Names of parameters that can be written
    pub fn writable_parameters(&self) -> impl Iterator<Item = (&String, &CapabilityParameter)> {
        self.parameters.iter().filter(|(_, p)| !p.read_only)
    }
}
