//! Parameter service for Gen1 and RPC smart relays
//!
//! [`ParameterService`] reads and writes canonical parameters (`eco_mode`,
//! `max_power`, ...) on any device. It resolves names through the device's
//! capability and the parameter catalog, then speaks the device's own
//! dialect:
//!
//! - Gen1: `GET /settings?eco_mode=false`, falling back through the
//!   configured [`Gen1Strategy`] chain until a write sticks
//! - Gen2 and later: `Shelly.SetConfig {"config": {...}}` over JSON-RPC
//!
//! # Example
//!
//! ```no_run
//! use relay_core::{Device, Generation};
//! use relay_service::{ParameterService, ServiceConfig};
//! use serde_json::json;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let service = ParameterService::open(ServiceConfig::load("relay.toml")?)?;
//! let plug = Device::new("shellyplug-s-C8C9A3", Generation::Gen1)
//!     .with_ip("192.168.1.20")
//!     .with_raw_type("SHPLG-S");
//!
//! service.set(&plug, "eco_mode", json!(false), false).await?;
//! assert_eq!(service.get(&plug, "eco_mode", true).await?, Some(json!(false)));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod group;
pub mod outcome;
pub mod protocol;
pub mod service;
pub mod strategy;

pub use config::ServiceConfig;
pub use group::{DeviceResult, GroupReport};
pub use outcome::{StrategyAttempt, Verification, WriteOutcome, WritePhase};
pub use protocol::{DeviceProtocol, Gen1Protocol, RpcProtocol};
pub use service::{ParameterListing, ParameterService};
pub use strategy::{ComponentRoute, Gen1Strategy};
