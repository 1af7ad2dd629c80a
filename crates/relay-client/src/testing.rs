//! Test utilities for relay-client
//!
//! - [`MockTransport`]: in-process transport with scripted replies that
//!   records every request, for unit tests of the layers above.
//! - [`TestDevice`]: an axum router served on an ephemeral port, for tests
//!   that exercise the real [`crate::HttpTransport`].

use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddr};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::TransportError;
use crate::request::{HttpMethod, HttpReply, HttpRequest};
use crate::rpc::{self, RpcRequest};
use crate::transport::DeviceTransport;

type Handler =
    Box<dyn Fn(&str, &HttpRequest) -> Option<Result<HttpReply, TransportError>> + Send + Sync>;

/// A request observed by [`MockTransport`]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub host: String,
    pub request: HttpRequest,
}

impl RecordedRequest {
    /// RPC method name if this was an RPC call
    pub fn rpc_method(&self) -> Option<String> {
        RpcRequest::from_http(&self.request).map(|r| r.method)
    }

    /// RPC params if this was an RPC call
    pub fn rpc_params(&self) -> Option<Value> {
        RpcRequest::from_http(&self.request).map(|r| r.params)
    }
}

/// Mock transport for testing
///
/// Handlers are consulted newest first, so a later registration overrides an
/// earlier one for the same route. Unmatched requests get a 404.
#[derive(Default)]
pub struct MockTransport {
    handlers: RwLock<Vec<Handler>>,
    unreachable: RwLock<HashSet<String>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a custom handler
    pub fn on<F>(&self, handler: F)
    where
        F: Fn(&str, &HttpRequest) -> Option<Result<HttpReply, TransportError>>
            + Send
            + Sync
            + 'static,
    {
        self.handlers.write().push(Box::new(handler));
    }

    /// Answer GETs to `path` (any query, any host) with a 200 JSON body
    pub fn on_get(&self, path: &str, body: Value) {
        let path = path.to_string();
        self.on(move |_, req| {
            (req.method == HttpMethod::Get && req.path == path).then(|| Ok(HttpReply::json(&body)))
        });
    }

    /// Answer any request to `path` with a bare status code
    pub fn on_status(&self, path: &str, status: u16) {
        let path = path.to_string();
        self.on(move |_, req| (req.path == path).then(|| Ok(HttpReply::new(status, ""))));
    }

    /// Answer an RPC method with a result
    pub fn on_rpc(&self, method: &str, result: Value) {
        let method = method.to_string();
        self.on(move |_, req| {
            let call = RpcRequest::from_http(req)?;
            (call.method == method)
                .then(|| Ok(HttpReply::new(200, rpc::result_body(call.id, result.clone()))))
        });
    }

    /// Answer an RPC method with an error envelope
    pub fn on_rpc_error(&self, method: &str, code: i64, message: &str) {
        let method = method.to_string();
        let message = message.to_string();
        self.on(move |_, req| {
            let call = RpcRequest::from_http(req)?;
            (call.method == method)
                .then(|| Ok(HttpReply::new(400, rpc::error_body(call.id, code, &message))))
        });
    }

    /// Make every request to `host` fail with a connection error
    pub fn set_unreachable(&self, host: &str) {
        self.unreachable.write().insert(host.to_string());
    }

    /// All requests seen so far
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// Requests sent to a specific host
    pub fn requests_for(&self, host: &str) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.host == host)
            .cloned()
            .collect()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn clear_requests(&self) {
        self.requests.lock().clear();
    }
}

#[async_trait]
impl DeviceTransport for MockTransport {
    async fn send(&self, host: &str, request: &HttpRequest) -> Result<HttpReply, TransportError> {
        self.requests.lock().push(RecordedRequest {
            host: host.to_string(),
            request: request.clone(),
        });

        if self.unreachable.read().contains(host) {
            return Err(TransportError::ConnectionFailed(format!(
                "{}: connection refused",
                host
            )));
        }

        let handlers = self.handlers.read();
        for handler in handlers.iter().rev() {
            if let Some(result) = handler(host, request) {
                return result;
            }
        }

        tracing::debug!(host, %request, "Mock transport: no handler, answering 404");
        Ok(HttpReply::new(404, "Not Found"))
    }
}

/// The serving half of a [`TestDevice`]
struct Serving {
    stop: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

impl Serving {
    fn stop(self) -> JoinHandle<std::io::Result<()>> {
        // The task may already be gone; then there is nobody to tell
        let _ = self.stop.send(());
        self.task
    }
}

/// An axum router standing in for a device on 127.0.0.1
///
/// The port is bound before `start` returns, so requests sent right away
/// wait in the accept queue instead of being refused. Taking the device
/// offline with [`shutdown`](Self::shutdown) lets a test turn a live device
/// into a dead one; dropping it does the same without waiting.
pub struct TestDevice {
    pub addr: SocketAddr,
    serving: Option<Serving>,
}

impl TestDevice {
    pub async fn start(router: axum::Router) -> std::io::Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
        let addr = listener.local_addr()?;
        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    stopped.await.ok();
                })
                .await
        });
        tracing::debug!(%addr, "Fake device listening");

        Ok(Self {
            addr,
            serving: Some(Serving { stop, task }),
        })
    }

    /// `ip:port`, as stored in a device's address
    pub fn host(&self) -> String {
        self.addr.to_string()
    }

    /// Stop accepting connections and wait for open ones to finish
    pub async fn shutdown(mut self) {
        if let Some(serving) = self.serving.take() {
            if let Ok(Err(e)) = serving.stop().await {
                tracing::warn!(addr = %self.addr, error = %e, "Fake device stopped with an error");
            }
        }
    }
}

impl Drop for TestDevice {
    fn drop(&mut self) {
        if let Some(serving) = self.serving.take() {
            serving.stop().abort();
        }
    }
}
