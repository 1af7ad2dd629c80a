//! relay-params - Canonical parameter catalog
//!
//! Callers speak in canonical parameter names (`eco_mode`, `max_power`). The
//! catalog maps each name to its type, bounds and the place it lives on each
//! device generation, and provides the value encodings each wire protocol
//! expects.
//!
//! # Quick Start
//!
//! ```rust
//! use relay_params::{encode_for_gen1, ParameterCatalog};
//! use serde_json::json;
//!
//! let catalog = ParameterCatalog::builtin();
//! let eco = catalog.get("eco_mode").unwrap();
//!
//! // Gen1 firmware wants "true"/"false" for eco_mode only
//! assert_eq!(encode_for_gen1(&eco, &json!(false)), "false");
//!
//! // Values from a command line are coerced to the definition's type
//! let max_power = catalog.get("max_power").unwrap();
//! assert_eq!(max_power.coerce(&json!("1500")).unwrap(), json!(1500));
//! ```

pub mod catalog;
pub mod definition;
pub mod encode;
pub mod error;
pub mod types;

pub use catalog::ParameterCatalog;
pub use definition::{Gen1Mapping, Gen2Mapping, ParameterDefinition};
pub use encode::{decode_from_gen1, encode_for_gen1, encode_for_gen2, gen1_value, on_off};
pub use error::{ParamError, ParamResult};
pub use types::ParamType;
