//! Device records produced by the discovery/registry collaborator

use serde::{Deserialize, Serialize};

/// Hardware/firmware protocol family of a device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Generation {
    #[default]
    Unknown,
    Gen1,
    Gen2,
    Gen3,
    Gen4,
}

impl Generation {
    /// Flat key/value HTTP settings API
    pub fn is_gen1(&self) -> bool {
        matches!(self, Generation::Gen1)
    }

    /// Nested JSON-RPC configuration API (Gen2 and later)
    pub fn is_rpc(&self) -> bool {
        matches!(self, Generation::Gen2 | Generation::Gen3 | Generation::Gen4)
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Generation::Unknown => "unknown",
            Generation::Gen1 => "gen1",
            Generation::Gen2 => "gen2",
            Generation::Gen3 => "gen3",
            Generation::Gen4 => "gen4",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for Generation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unknown" => Ok(Generation::Unknown),
            "gen1" | "1" => Ok(Generation::Gen1),
            "gen2" | "2" => Ok(Generation::Gen2),
            "gen3" | "3" => Ok(Generation::Gen3),
            "gen4" | "4" => Ok(Generation::Gen4),
            _ => Err(format!("Unknown generation: '{}'", s)),
        }
    }
}

/// A networked smart-relay device
///
/// The raw vendor strings are used only for capability matching and are
/// neither unique nor guaranteed to be present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Device identifier, e.g. "shellyplug-s-C8C9A3" or "shellyplus2pm-a8032ab1"
    pub id: String,
    /// Protocol family
    #[serde(default)]
    pub generation: Generation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    /// Gen1 `type` field from `/shelly` (e.g. "SHPLG-S")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_type: Option<String>,
    /// Gen2+ `app` field (e.g. "Plus2PM")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_app: Option<String>,
    /// Gen2+ `model` field (e.g. "SNSW-102P16EU")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_model: Option<String>,
}

impl Device {
    /// Create a device with an id and generation
    pub fn new(id: impl Into<String>, generation: Generation) -> Self {
        Self {
            id: id.into(),
            generation,
            ..Default::default()
        }
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    pub fn with_mac(mut self, mac: impl Into<String>) -> Self {
        self.mac_address = Some(mac.into());
        self
    }

    pub fn with_raw_type(mut self, raw_type: impl Into<String>) -> Self {
        self.raw_type = Some(raw_type.into());
        self
    }

    pub fn with_raw_app(mut self, raw_app: impl Into<String>) -> Self {
        self.raw_app = Some(raw_app.into());
        self
    }

    pub fn with_raw_model(mut self, raw_model: impl Into<String>) -> Self {
        self.raw_model = Some(raw_model.into());
        self
    }

    /// Network address to talk to, if the device has a usable one
    pub fn host(&self) -> Option<&str> {
        non_empty(self.ip_address.as_deref())
    }

    pub fn raw_type(&self) -> Option<&str> {
        non_empty(self.raw_type.as_deref())
    }

    pub fn raw_app(&self) -> Option<&str> {
        non_empty(self.raw_app.as_deref())
    }

    pub fn raw_model(&self) -> Option<&str> {
        non_empty(self.raw_model.as_deref())
    }

    pub fn mac(&self) -> Option<&str> {
        non_empty(self.mac_address.as_deref())
    }

    /// The part of the id before the first `-` ("shellyplug" for "shellyplug-s-C8C9A3")
    pub fn id_prefix(&self) -> Option<&str> {
        let prefix = self.id.split('-').next()?;
        non_empty(Some(prefix))
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_parse_and_display() {
        assert_eq!("gen1".parse::<Generation>().unwrap(), Generation::Gen1);
        assert_eq!("GEN3".parse::<Generation>().unwrap(), Generation::Gen3);
        assert_eq!("2".parse::<Generation>().unwrap(), Generation::Gen2);
        assert!("gen9".parse::<Generation>().is_err());
        assert_eq!(Generation::Gen4.to_string(), "gen4");
        assert!(Generation::Gen3.is_rpc());
        assert!(!Generation::Unknown.is_rpc());
        assert!(!Generation::Unknown.is_gen1());
    }

    #[test]
    fn test_host_ignores_blank_address() {
        let device = Device::new("shelly1-123", Generation::Gen1).with_ip("  ");
        assert_eq!(device.host(), None);

        let device = device.with_ip("192.168.1.20");
        assert_eq!(device.host(), Some("192.168.1.20"));
    }

    #[test]
    fn test_id_prefix() {
        let device = Device::new("shellyplug-s-C8C9A3", Generation::Gen1);
        assert_eq!(device.id_prefix(), Some("shellyplug"));

        let device = Device::new("-weird", Generation::Gen1);
        assert_eq!(device.id_prefix(), None);
    }

    #[test]
    fn test_serde_defaults() {
        let device: Device = serde_json::from_str(r#"{"id": "abc"}"#).unwrap();
        assert_eq!(device.generation, Generation::Unknown);
        assert!(device.raw_type.is_none());
    }
}
