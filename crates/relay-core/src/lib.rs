//! relay-core - Core types for the smart-relay parameter layer
//!
//! This crate provides the device model consumed from the discovery/registry
//! collaborator, the shared error taxonomy, and helpers for navigating the
//! dotted parameter paths used by both device generations.

pub mod device;
pub mod error;
pub mod path;
pub mod registry;

pub use device::{Device, Generation};
pub use error::{RelayError, RelayResult};
pub use registry::{DeviceRegistry, MemoryRegistry};
