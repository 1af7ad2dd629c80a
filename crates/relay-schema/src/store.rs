//! Capability schema store
//!
//! Holds every known [`DeviceCapability`] plus a reverse index from raw
//! vendor identifiers to device types. The map and the index sit behind one
//! lock so an upsert is a single critical section.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use relay_core::Device;
use tracing::{debug, info, warn};

use crate::capability::DeviceCapability;
use crate::error::{SchemaError, SchemaResult};
use crate::files::CapabilityFileStore;

#[derive(Debug, Default)]
struct StoreInner {
    capabilities: BTreeMap<String, DeviceCapability>,
    /// raw identifier -> device_type
    type_index: HashMap<String, String>,
}

impl StoreInner {
    /// Index a capability's keys; keys already owned by another type are kept
    fn index(&mut self, capability: &DeviceCapability) {
        for key in capability.index_keys() {
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            match self.type_index.get(key) {
                Some(owner) if owner != &capability.device_type => {
                    warn!(
                        mapping = %key,
                        owner = %owner,
                        device_type = %capability.device_type,
                        "Type mapping already claimed, keeping first"
                    );
                }
                Some(_) => {}
                None => {
                    self.type_index
                        .insert(key.to_string(), capability.device_type.clone());
                }
            }
        }
    }

    /// Drop a type's keys and return them
    fn unindex(&mut self, device_type: &str) -> HashSet<String> {
        let mut freed = HashSet::new();
        self.type_index.retain(|key, owner| {
            if owner == device_type {
                freed.insert(key.clone());
                return false;
            }
            true
        });
        freed
    }

    /// Give unowned keys to the other types claiming them, in device-type order
    fn reassign(&mut self, mut freed: HashSet<String>, except: &str) {
        freed.retain(|key| !self.type_index.contains_key(key));
        for capability in self.capabilities.values() {
            if freed.is_empty() {
                break;
            }
            if capability.device_type == except {
                continue;
            }
            for key in capability.index_keys() {
                let key = key.trim();
                if freed.remove(key) {
                    debug!(mapping = %key, device_type = %capability.device_type, "Type mapping reassigned");
                    self.type_index
                        .insert(key.to_string(), capability.device_type.clone());
                }
            }
        }
    }

    fn upsert(&mut self, capability: DeviceCapability) {
        let freed = self.unindex(&capability.device_type);
        self.index(&capability);
        self.reassign(freed, &capability.device_type);
        self.capabilities
            .insert(capability.device_type.clone(), capability);
    }

    fn remove(&mut self, device_type: &str) -> bool {
        let existed = self.capabilities.remove(device_type).is_some();
        let freed = self.unindex(device_type);
        self.reassign(freed, device_type);
        existed
    }

    fn resolve_type(&self, device: &Device) -> Option<&str> {
        let exact = [device.raw_type(), device.raw_app(), device.raw_model()];
        for identifier in exact.into_iter().flatten() {
            if let Some(device_type) = self.type_index.get(identifier) {
                return Some(device_type.as_str());
            }
        }

        // Case-insensitive prefix of the id; longest key wins, then lexical order
        let id = device.id.trim().to_lowercase();
        if id.is_empty() {
            return None;
        }
        self.type_index
            .iter()
            .filter(|(key, _)| id.starts_with(&key.to_lowercase()))
            .max_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| b.cmp(a)))
            .map(|(_, device_type)| device_type.as_str())
    }
}

/// Store of device capabilities backed by a [`CapabilityFileStore`]
pub struct CapabilityStore {
    files: Arc<dyn CapabilityFileStore>,
    inner: RwLock<StoreInner>,
}

impl std::fmt::Debug for CapabilityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("CapabilityStore")
            .field("capabilities", &inner.capabilities.len())
            .field("mappings", &inner.type_index.len())
            .finish()
    }
}

impl CapabilityStore {
    /// Create an empty store; call [`load_all`](Self::load_all) to populate it
    pub fn new(files: Arc<dyn CapabilityFileStore>) -> Self {
        Self {
            files,
            inner: RwLock::new(StoreInner::default()),
        }
    }

    /// Create a store and load every persisted capability
    pub fn open(files: Arc<dyn CapabilityFileStore>) -> SchemaResult<Self> {
        let store = Self::new(files);
        store.load_all()?;
        Ok(store)
    }

    /// Rebuild the map and index from storage
    ///
    /// Malformed documents are logged and skipped. Returns the number of
    /// capabilities loaded.
    pub fn load_all(&self) -> SchemaResult<usize> {
        let documents = self.files.load_capability_files()?;
        let mut fresh = StoreInner::default();

        for raw in documents {
            let capability: DeviceCapability = match serde_yaml::from_value(raw.document) {
                Ok(capability) => capability,
                Err(e) => {
                    warn!(source = %raw.source, error = %e, "Skipping malformed capability document");
                    continue;
                }
            };
            if capability.device_type.trim().is_empty() {
                warn!(source = %raw.source, "Skipping capability document without device_type");
                continue;
            }
            if fresh.capabilities.contains_key(&capability.device_type) {
                warn!(
                    source = %raw.source,
                    device_type = %capability.device_type,
                    "Duplicate capability document, keeping first"
                );
                continue;
            }
            fresh.index(&capability);
            fresh
                .capabilities
                .insert(capability.device_type.clone(), capability);
        }

        let count = fresh.capabilities.len();
        *self.inner.write() = fresh;
        info!(count, "Loaded device capabilities");
        Ok(count)
    }

    /// Same as [`load_all`](Self::load_all); discards in-memory state first
    pub fn reload(&self) -> SchemaResult<usize> {
        self.load_all()
    }

    /// Find the capability for a device
    ///
    /// Precedence: exact `raw_type`, exact `raw_app`, exact `raw_model`, then
    /// the longest mapping key that prefixes the device id (case-insensitive).
    pub fn resolve(&self, device: &Device) -> Option<DeviceCapability> {
        let inner = self.inner.read();
        let device_type = inner.resolve_type(device)?;
        debug!(device_id = %device.id, device_type, "Resolved capability");
        inner.capabilities.get(device_type).cloned()
    }

    /// Persist and index a capability, replacing any with the same device type
    pub fn save(&self, capability: DeviceCapability) -> SchemaResult<()> {
        if capability.device_type.trim().is_empty() {
            return Err(SchemaError::InvalidDocument {
                source_name: "<save>".to_string(),
                reason: "empty device_type".to_string(),
            });
        }
        let document = serde_yaml::to_value(&capability)?;

        // Persist under the write lock so storage and index never disagree
        let mut inner = self.inner.write();
        self.files
            .save_capability_file(&capability.device_type, &document)?;
        info!(
            device_type = %capability.device_type,
            parameters = capability.parameters.len(),
            "Saved device capability"
        );
        inner.upsert(capability);
        Ok(())
    }

    /// Capability by device type
    pub fn get(&self, device_type: &str) -> Option<DeviceCapability> {
        self.inner.read().capabilities.get(device_type).cloned()
    }

    /// Remove a capability and its mappings; returns whether it existed
    ///
    /// Keys the removed type owned pass to any remaining type that claims them.
    pub fn delete(&self, device_type: &str) -> SchemaResult<bool> {
        let mut inner = self.inner.write();
        let persisted = self.files.delete_capability_file(device_type)?;
        let existed = inner.remove(device_type);
        if existed {
            info!(device_type, "Deleted device capability");
        }
        Ok(existed || persisted)
    }

    /// All capabilities, ordered by device type
    pub fn list(&self) -> Vec<DeviceCapability> {
        self.inner.read().capabilities.values().cloned().collect()
    }

    pub fn device_types(&self) -> Vec<String> {
        self.inner.read().capabilities.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().capabilities.is_empty()
    }
}
