//! Device registry collaborator
//!
//! The registry is owned by the discovery layer; the parameter layer only
//! fetches and persists records by id.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::device::Device;
use crate::error::RelayResult;

/// Fetch/persist devices by id
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    /// Look up a device by id
    async fn get(&self, id: &str) -> RelayResult<Option<Device>>;

    /// Insert or replace a device record
    async fn put(&self, device: Device) -> RelayResult<()>;
}

/// In-memory registry, used by tests and embedders without persistence
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    devices: RwLock<HashMap<String, Device>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-populated with devices
    pub fn with_devices(devices: impl IntoIterator<Item = Device>) -> Self {
        let registry = Self::new();
        {
            let mut map = registry.devices.write();
            for device in devices {
                map.insert(device.id.clone(), device);
            }
        }
        registry
    }

    pub fn len(&self) -> usize {
        self.devices.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DeviceRegistry for MemoryRegistry {
    async fn get(&self, id: &str) -> RelayResult<Option<Device>> {
        Ok(self.devices.read().get(id).cloned())
    }

    async fn put(&self, device: Device) -> RelayResult<()> {
        self.devices.write().insert(device.id.clone(), device);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Generation;

    #[tokio::test]
    async fn test_memory_registry_put_get() {
        let registry = MemoryRegistry::new();
        assert!(registry.is_empty());

        registry
            .put(Device::new("shelly1-1", Generation::Gen1).with_ip("10.0.0.5"))
            .await
            .unwrap();

        let device = registry.get("shelly1-1").await.unwrap().unwrap();
        assert_eq!(device.host(), Some("10.0.0.5"));
        assert!(registry.get("missing").await.unwrap().is_none());
    }
}
