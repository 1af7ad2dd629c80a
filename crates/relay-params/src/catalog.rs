//! Parameter catalog - canonical names and their generation mappings
//!
//! The catalog is a YAML document keyed by canonical name:
//!
//! ```yaml
//! version: "1"
//! parameters:
//!   eco_mode:
//!     display_name: Eco mode
//!     type: boolean
//!     group: power
//!     gen1:
//!       endpoint: /settings
//!       property: eco_mode
//!     gen2:
//!       method: Sys.SetConfig
//!       component: sys
//!       property: device.eco_mode
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::definition::ParameterDefinition;
use crate::error::ParamResult;
use crate::types::ParamType;

/// On-disk catalog document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CatalogFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde(default)]
    parameters: BTreeMap<String, ParameterDefinition>,
}

/// Thread-safe catalog of canonical parameter definitions
#[derive(Debug, Default)]
pub struct ParameterCatalog {
    definitions: RwLock<BTreeMap<String, ParameterDefinition>>,
}

impl ParameterCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with the built-in definitions
    pub fn builtin() -> Self {
        let catalog = Self::new();
        let mut defs = catalog.definitions.write();
        for def in builtin_definitions() {
            defs.insert(def.name.clone(), def);
        }
        drop(defs);
        catalog
    }

    /// Load definitions from a YAML string
    pub fn from_yaml(yaml: &str) -> ParamResult<Self> {
        let file: CatalogFile = serde_yaml::from_str(yaml)?;
        let catalog = Self::new();
        for (name, mut def) in file.parameters {
            def.name = name;
            catalog.register(def)?;
        }
        Ok(catalog)
    }

    /// Load definitions from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> ParamResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load the catalog at `path`, writing the built-in one there first if absent
    pub fn load_or_init(path: impl AsRef<Path>) -> ParamResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            let catalog = Self::from_file(path)?;
            info!(path = %path.display(), count = catalog.len(), "Loaded parameter catalog");
            return Ok(catalog);
        }

        let catalog = Self::builtin();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, catalog.to_yaml()?)?;
        info!(path = %path.display(), count = catalog.len(), "Initialized default parameter catalog");
        Ok(catalog)
    }

    /// Serialize the catalog as a YAML document
    pub fn to_yaml(&self) -> ParamResult<String> {
        let file = CatalogFile {
            version: Some("1".to_string()),
            parameters: self.definitions.read().clone(),
        };
        Ok(serde_yaml::to_string(&file)?)
    }

    /// Add or replace a definition
    pub fn register(&self, def: ParameterDefinition) -> ParamResult<()> {
        def.check()?;
        if let Some(previous) = self.definitions.write().insert(def.name.clone(), def) {
            warn!(name = %previous.name, "Replaced parameter definition");
        }
        Ok(())
    }

    /// Definition by canonical name
    pub fn get(&self, name: &str) -> Option<ParameterDefinition> {
        self.definitions.read().get(name).cloned()
    }

    /// All definitions in a group, ordered by name
    pub fn get_by_group(&self, group: &str) -> Vec<ParameterDefinition> {
        self.definitions
            .read()
            .values()
            .filter(|def| def.group.as_deref() == Some(group))
            .cloned()
            .collect()
    }

    /// All canonical names, sorted
    pub fn names(&self) -> Vec<String> {
        self.definitions.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.definitions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.read().is_empty()
    }

    /// Gen1 query key for a canonical name (unknown names pass through)
    pub fn to_gen1_name(&self, canonical: &str) -> String {
        self.definitions
            .read()
            .get(canonical)
            .and_then(|def| def.gen1.as_ref())
            .map(|gen1| gen1.property.clone())
            .unwrap_or_else(|| canonical.to_string())
    }

    /// Canonical name for a Gen1 query key (unknown names pass through)
    pub fn to_standard_name(&self, gen1_name: &str) -> String {
        let defs = self.definitions.read();
        if defs.contains_key(gen1_name) {
            return gen1_name.to_string();
        }
        defs.values()
            .find(|def| {
                def.gen1
                    .as_ref()
                    .is_some_and(|gen1| gen1.property == gen1_name)
            })
            .map(|def| def.name.clone())
            .unwrap_or_else(|| gen1_name.to_string())
    }
}

/// Definitions shipped with the library
fn builtin_definitions() -> Vec<ParameterDefinition> {
    vec![
        ParameterDefinition::new("eco_mode", ParamType::Boolean)
            .with_display_name("Eco mode")
            .with_description("Reduce power draw of the device electronics")
            .with_group("power")
            .with_gen1("/settings", "eco_mode")
            .with_gen2("Sys.SetConfig", "sys", "device.eco_mode"),
        ParameterDefinition::new("max_power", ParamType::Integer)
            .with_display_name("Maximum power")
            .with_description("Overpower protection threshold")
            .with_unit("W")
            .with_bounds(0.0, 3500.0)
            .with_group("power")
            .with_gen1("/settings", "max_power")
            .with_gen2("Switch.SetConfig", "switch:0", "power_limit"),
        ParameterDefinition::new("led_status_disable", ParamType::Boolean)
            .with_display_name("Disable status LED")
            .with_group("ui")
            .with_gen1("/settings", "led_status_disable"),
        ParameterDefinition::new("default_state", ParamType::Enum)
            .with_display_name("Power-on state")
            .with_enum_values(["off", "on", "last", "switch"])
            .with_group("relay")
            .with_gen1("/settings/relay/0", "default_state"),
        ParameterDefinition::new("auto_off", ParamType::Float)
            .with_display_name("Auto-off timer")
            .with_unit("s")
            .with_bounds(0.0, 86400.0)
            .with_group("relay")
            .with_gen1("/settings/relay/0", "auto_off")
            .with_gen2("Switch.SetConfig", "switch:0", "auto_off_delay"),
        ParameterDefinition::new("name", ParamType::String)
            .with_display_name("Device name")
            .with_group("device")
            .with_gen1("/settings", "name")
            .with_gen2("Sys.SetConfig", "sys", "device.name"),
        ParameterDefinition::new("timezone", ParamType::String)
            .with_display_name("Timezone")
            .with_group("device")
            .with_gen1("/settings", "timezone")
            .with_gen2("Sys.SetConfig", "sys", "location.tz"),
        ParameterDefinition::new("mqtt_enable", ParamType::Boolean)
            .with_display_name("MQTT enabled")
            .requires_restart()
            .with_group("network")
            .with_gen1("/settings", "mqtt_enable")
            .with_gen2("MQTT.SetConfig", "mqtt", "enable"),
        ParameterDefinition::new("uptime", ParamType::Integer)
            .with_display_name("Uptime")
            .with_unit("s")
            .read_only()
            .with_group("status")
            .with_gen1("/status", "uptime")
            .with_gen2("Sys.GetStatus", "sys", "uptime"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParamError;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_builtin_catalog() {
        let catalog = ParameterCatalog::builtin();
        assert!(catalog.len() >= 8);

        let eco = catalog.get("eco_mode").unwrap();
        assert_eq!(eco.param_type, ParamType::Boolean);
        assert_eq!(eco.gen2.unwrap().config_path(), "sys.device.eco_mode");

        assert!(catalog.get("uptime").unwrap().read_only);
        assert!(catalog.get("mqtt_enable").unwrap().requires_restart);
        assert!(catalog.get("bogus").is_none());
    }

    #[test]
    fn test_name_translation() {
        let catalog = ParameterCatalog::from_yaml(
            r#"
parameters:
  led_disabled:
    type: boolean
    gen1:
      property: led_status_disable
"#,
        )
        .unwrap();

        assert_eq!(catalog.to_gen1_name("led_disabled"), "led_status_disable");
        assert_eq!(catalog.to_standard_name("led_status_disable"), "led_disabled");
        assert_eq!(catalog.to_gen1_name("unknown_thing"), "unknown_thing");
        assert_eq!(catalog.to_standard_name("unknown_thing"), "unknown_thing");

        // Endpoint defaults to /settings
        let def = catalog.get("led_disabled").unwrap();
        assert_eq!(def.gen1.unwrap().endpoint, "/settings");
    }

    #[test]
    fn test_get_by_group() {
        let catalog = ParameterCatalog::builtin();
        let names: Vec<_> = catalog
            .get_by_group("power")
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["eco_mode", "max_power"]);
        assert!(catalog.get_by_group("nope").is_empty());
    }

    #[test]
    fn test_enum_without_values_rejected_at_load() {
        let result = ParameterCatalog::from_yaml(
            r#"
parameters:
  default_state:
    type: enum
"#,
        );
        assert!(matches!(result, Err(ParamError::InvalidDefinition { .. })));
    }

    #[test]
    fn test_yaml_roundtrip_preserves_definitions() {
        let catalog = ParameterCatalog::builtin();
        let yaml = catalog.to_yaml().unwrap();
        let reloaded = ParameterCatalog::from_yaml(&yaml).unwrap();

        assert_eq!(reloaded.names(), catalog.names());
        for name in catalog.names() {
            assert_eq!(reloaded.get(&name), catalog.get(&name));
        }
    }

    #[test]
    fn test_load_or_init_writes_default_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("parameters.yaml");

        let first = ParameterCatalog::load_or_init(&path).unwrap();
        assert!(path.exists());
        assert_eq!(first.len(), ParameterCatalog::builtin().len());

        // Edit on disk and make sure the file, not the default, is used next time
        std::fs::write(
            &path,
            "parameters:\n  eco_mode:\n    type: boolean\n    read_only: true\n",
        )
        .unwrap();
        let second = ParameterCatalog::load_or_init(&path).unwrap();
        assert_eq!(second.len(), 1);
        assert!(second.get("eco_mode").unwrap().read_only);
    }

    #[test]
    fn test_register_validates() {
        let catalog = ParameterCatalog::new();
        assert!(catalog.is_empty());
        catalog
            .register(ParameterDefinition::new("eco_mode", ParamType::Boolean))
            .unwrap();
        assert!(catalog
            .register(ParameterDefinition::new("", ParamType::Boolean))
            .is_err());
        assert_eq!(catalog.len(), 1);
        assert!(catalog.get("eco_mode").unwrap().validate(&json!("on")).is_ok());
    }
}
