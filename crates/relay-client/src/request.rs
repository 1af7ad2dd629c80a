//! Transport-neutral request/response types

use serde_json::Value;

/// HTTP method used against a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpMethod::Get => f.write_str("GET"),
            HttpMethod::Post => f.write_str("POST"),
        }
    }
}

/// How the query string is rendered
///
/// Gen1 firmware differs in what it accepts: some builds only parse the
/// literal `name=value` form, others need percent-encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueryEncoding {
    /// `name=value` pairs joined verbatim
    #[default]
    Raw,
    /// `application/x-www-form-urlencoded` percent-encoding
    Encoded,
}

/// Request body
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    None,
    /// `application/x-www-form-urlencoded`
    Form(Vec<(String, String)>),
    /// `application/json`
    Json(Value),
}

/// A single request to a device
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    /// Absolute path, e.g. "/settings" or "/rpc"
    pub path: String,
    pub query: Vec<(String, String)>,
    pub encoding: QueryEncoding,
    pub body: RequestBody,
}

impl HttpRequest {
    /// GET request without query
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: normalize_path(path.into()),
            query: Vec::new(),
            encoding: QueryEncoding::Raw,
            body: RequestBody::None,
        }
    }

    /// Form-encoded POST
    pub fn post_form(path: impl Into<String>, form: Vec<(String, String)>) -> Self {
        Self {
            method: HttpMethod::Post,
            body: RequestBody::Form(form),
            ..Self::get(path)
        }
    }

    /// JSON POST
    pub fn post_json(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            body: RequestBody::Json(body),
            ..Self::get(path)
        }
    }

    /// Append a query pair
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Render the query with percent-encoding
    pub fn encoded(mut self) -> Self {
        self.encoding = QueryEncoding::Encoded;
        self
    }

    /// Rendered query string without the leading `?`
    ///
    /// ```
    /// # use relay_client::HttpRequest;
    /// let req = HttpRequest::get("/settings").with_query("name", "Living room");
    /// assert_eq!(req.query_string(), "name=Living room");
    /// assert_eq!(req.clone().encoded().query_string(), "name=Living+room");
    /// ```
    pub fn query_string(&self) -> String {
        match self.encoding {
            QueryEncoding::Raw => self
                .query
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("&"),
            QueryEncoding::Encoded => url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(self.query.iter())
                .finish(),
        }
    }

    /// Value of a query parameter, if present
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Value of a form field, if this is a form POST
    pub fn form_value(&self, key: &str) -> Option<&str> {
        match &self.body {
            RequestBody::Form(pairs) => pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }
}

impl std::fmt::Display for HttpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let query = self.query_string();
        if query.is_empty() {
            write!(f, "{} {}", self.method, self.path)
        } else {
            write!(f, "{} {}?{}", self.method, self.path, query)
        }
    }
}

fn normalize_path(path: String) -> String {
    if path.starts_with('/') {
        path
    } else {
        format!("/{}", path)
    }
}

/// Device reply: status code and raw body
#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 200 reply with a JSON body
    pub fn json(value: &Value) -> Self {
        Self::new(200, value.to_string())
    }

    /// Devices signal success with exactly 200
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Parse the body as JSON
    pub fn body_json(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_path_is_normalized() {
        assert_eq!(HttpRequest::get("settings").path, "/settings");
        assert_eq!(HttpRequest::get("/status").path, "/status");
    }

    #[test]
    fn test_display() {
        let req = HttpRequest::get("/settings").with_query("eco_mode", "false");
        assert_eq!(req.to_string(), "GET /settings?eco_mode=false");
        assert_eq!(HttpRequest::get("/reboot").to_string(), "GET /reboot");
    }

    #[test]
    fn test_encoded_query_escapes_reserved_characters() {
        let req = HttpRequest::get("/settings")
            .with_query("mqtt_server", "broker.local:1883/x")
            .encoded();
        assert_eq!(req.query_string(), "mqtt_server=broker.local%3A1883%2Fx");
    }

    #[test]
    fn test_form_value() {
        let req = HttpRequest::post_form(
            "/settings",
            vec![("max_power".to_string(), "2000".to_string())],
        );
        assert_eq!(req.form_value("max_power"), Some("2000"));
        assert_eq!(req.query_value("max_power"), None);
    }

    #[test]
    fn test_reply_json() {
        let reply = HttpReply::json(&json!({"eco_mode": true}));
        assert!(reply.is_ok());
        assert_eq!(reply.body_json(), Some(json!({"eco_mode": true})));
        assert_eq!(HttpReply::new(200, "not json").body_json(), None);
        assert!(!HttpReply::new(204, "").is_ok());
    }
}
