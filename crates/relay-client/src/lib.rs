//! Device transport for smart-relay devices
//!
//! Gen1 devices speak plain HTTP: query-string and form-encoded GET/POST
//! against paths like `/settings` and `/relay/0`. Gen2 and later devices
//! accept JSON-RPC envelopes `{id, method, params}` POSTed to `/rpc`.
//! Both go through the single [`DeviceTransport`] seam so the layers above
//! can be tested against [`testing::MockTransport`] without a network.
//!
//! # Example
//!
//! ```rust,no_run
//! use relay_client::{rpc, DeviceTransport, HttpRequest, HttpTransport};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), relay_client::TransportError> {
//!     let transport = HttpTransport::new()?;
//!
//!     // Gen1: flat settings
//!     let reply = transport
//!         .send("192.168.1.20", &HttpRequest::get("/settings").with_query("eco_mode", "true"))
//!         .await?;
//!     assert!(reply.is_ok());
//!
//!     // Gen2: JSON-RPC
//!     let config = rpc::call(&transport, "192.168.1.30", "Sys.GetConfig", json!({})).await?;
//!     println!("{}", config["device"]["eco_mode"]);
//!     Ok(())
//! }
//! ```

mod error;
mod http;
mod request;
pub mod rpc;
pub mod testing;
mod transport;

pub use error::TransportError;
pub use http::HttpTransport;
pub use request::{HttpMethod, HttpReply, HttpRequest, QueryEncoding, RequestBody};
pub use transport::DeviceTransport;
