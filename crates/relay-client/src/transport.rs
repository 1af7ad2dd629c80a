//! Device transport trait

use async_trait::async_trait;

use crate::error::TransportError;
use crate::request::{HttpReply, HttpRequest};

/// Transport-agnostic interface for talking to a device
///
/// A transport sends one request to one host and returns whatever the device
/// answered. Non-200 statuses are replies, not errors; only failures to get
/// an answer at all (connection refused, timeout, bad URL) are errors.
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    /// Send a request to `host` ("192.168.1.20" or "127.0.0.1:8080")
    async fn send(&self, host: &str, request: &HttpRequest) -> Result<HttpReply, TransportError>;
}
