//! relay-discovery - Capability inference for live devices
//!
//! The [`DiscoveryEngine`] probes a device over its generation's protocol,
//! walks every JSON response, and turns each leaf into a capability
//! parameter keyed by its flattened path:
//!
//! - Gen1: `GET /shelly`, `/settings`, `/status` and their sub-endpoints.
//!   `/settings/relay/0` contributes `relay_0_default_state` and friends.
//! - Gen2 and later: `Shelly.GetConfig` and the per-component `GetConfig`
//!   methods; each parameter records the `SetConfig` method that writes it
//!   (`sys_device_name` -> `Sys.SetConfig`, path `device.name`).
//!
//! Read-only classification is driven by [`ClassificationRules`].

pub mod engine;
pub mod flatten;
pub mod identity;
pub mod probe;
pub mod rules;

pub use engine::{DiscoveryConfig, DiscoveryEngine};
pub use flatten::{leaves, sketch};
pub use identity::{device_type_for, seed_mappings};
pub use probe::{component_id, component_namespace, set_config_method};
pub use rules::ClassificationRules;
