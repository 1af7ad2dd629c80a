//! relay-schema - Device capability schemas
//!
//! A [`DeviceCapability`] describes, for one device type, which wire APIs it
//! answers and which parameters it exposes through them. The
//! [`CapabilityStore`] keeps every known capability, persists them through a
//! [`CapabilityFileStore`], and resolves a live [`relay_core::Device`] to its
//! capability by raw vendor identifiers.
//!
//! # Document format
//!
//! ```yaml
//! device_type: SHPLG-S
//! name: SHPLG-S
//! generation: gen1
//! apis:
//!   settings:
//!     description: GET /settings
//!     response_structure:
//!       eco_mode: boolean
//! parameters:
//!   eco_mode:
//!     type: boolean
//!     description: ''
//!     api: settings
//!     parameter_path: eco_mode
//!     read_only: false
//! type_mappings:
//!   - SHPLG-S
//!   - shellyplug
//! ```

pub mod capability;
pub mod error;
pub mod files;
pub mod store;

pub use capability::{ApiInfo, CapabilityParameter, DeviceCapability};
pub use error::{SchemaError, SchemaResult};
pub use files::{
    CapabilityFileStore, MemoryCapabilityFiles, RawCapabilityDocument, YamlCapabilityFiles,
};
pub use store::CapabilityStore;
