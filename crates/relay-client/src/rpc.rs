//! JSON-RPC framing for Gen2 and later devices
//!
//! Requests are POSTed to `/rpc` as `{"id": n, "method": "...", "params": {...}}`.
//! A device answers with either `{"id": n, "result": ...}` or
//! `{"id": n, "error": {"code": c, "message": "..."}}`.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::TransportError;
use crate::request::{HttpReply, HttpRequest};
use crate::transport::DeviceTransport;

/// Path that accepts RPC envelopes
pub const RPC_PATH: &str = "/rpc";

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Outgoing RPC envelope
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcRequest {
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl RpcRequest {
    /// Build an envelope with a fresh id
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            method: method.into(),
            params,
        }
    }

    /// Wrap into an HTTP request
    pub fn to_http(&self) -> HttpRequest {
        HttpRequest::post_json(
            RPC_PATH,
            serde_json::json!({
                "id": self.id,
                "method": self.method,
                "params": self.params,
            }),
        )
    }

    /// Recover the envelope from an HTTP request (used by fakes and tests)
    pub fn from_http(request: &HttpRequest) -> Option<Self> {
        match &request.body {
            crate::request::RequestBody::Json(body) if request.path == RPC_PATH => {
                serde_json::from_value(body.clone()).ok()
            }
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// Interpret a device reply to an RPC request
pub fn parse_reply(reply: &HttpReply) -> Result<Value, TransportError> {
    let envelope: Option<RpcEnvelope> = serde_json::from_str(&reply.body).ok();

    // Gen2 firmware answers RPC errors with HTTP 4xx/5xx but still sends the envelope
    if let Some(RpcEnvelope {
        error: Some(err), ..
    }) = envelope
    {
        return Err(TransportError::Rpc {
            code: err.code,
            message: err.message,
        });
    }

    if !reply.is_ok() {
        return Err(TransportError::Http {
            status: reply.status,
            message: reply.body.clone(),
        });
    }

    match serde_json::from_str::<RpcEnvelope>(&reply.body) {
        Ok(envelope) => Ok(envelope.result.unwrap_or(Value::Null)),
        Err(e) => Err(TransportError::InvalidResponse(e.to_string())),
    }
}

/// Call an RPC method and return its `result`
pub async fn call(
    transport: &dyn DeviceTransport,
    host: &str,
    method: &str,
    params: Value,
) -> Result<Value, TransportError> {
    let request = RpcRequest::new(method, params);
    debug!(host, method, id = request.id, "RPC call");
    let reply = transport.send(host, &request.to_http()).await?;
    parse_reply(&reply)
}

/// Success envelope, as a device would send it
pub fn result_body(id: u64, result: Value) -> String {
    serde_json::json!({ "id": id, "result": result }).to_string()
}

/// Error envelope, as a device would send it
pub fn error_body(id: u64, code: i64, message: &str) -> String {
    serde_json::json!({ "id": id, "error": { "code": code, "message": message } }).to_string()
}
