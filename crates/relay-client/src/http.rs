//! reqwest-backed device transport

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

use crate::error::TransportError;
use crate::request::{HttpMethod, HttpReply, HttpRequest, RequestBody};
use crate::transport::DeviceTransport;

/// Default request timeout (devices answer quickly or not at all)
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default connection timeout
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// HTTP transport for real devices
///
/// Every call carries a short fixed timeout; a timeout surfaces as
/// [`TransportError::Timeout`] and is treated as a normal failure by callers.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a transport with default timeouts
    pub fn new() -> Result<Self, TransportError> {
        Self::with_config(DEFAULT_TIMEOUT, DEFAULT_CONNECT_TIMEOUT)
    }

    /// Create a transport with custom timeouts
    pub fn with_config(timeout: Duration, connect_timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Get a reference to the underlying HTTP client
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    fn url_for(host: &str, request: &HttpRequest) -> Result<Url, TransportError> {
        let base = if host.starts_with("http://") || host.starts_with("https://") {
            host.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", host)
        };
        let mut url = Url::parse(&format!("{}{}", base, request.path))?;
        let query = request.query_string();
        if !query.is_empty() {
            url.set_query(Some(&query));
        }
        Ok(url)
    }
}

#[async_trait]
impl DeviceTransport for HttpTransport {
    #[instrument(skip(self, request), fields(request = %request))]
    async fn send(&self, host: &str, request: &HttpRequest) -> Result<HttpReply, TransportError> {
        let url = Self::url_for(host, request)?;

        let builder = match request.method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => self.client.post(url),
        };
        let builder = match &request.body {
            RequestBody::None => builder,
            RequestBody::Form(pairs) => builder.form(pairs),
            RequestBody::Json(body) => builder.json(body),
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(status, bytes = body.len(), "Device replied");

        Ok(HttpReply::new(status, body))
    }
}
