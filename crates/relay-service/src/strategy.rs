//! Gen1 write strategies
//!
//! Gen1 firmware has accepted settings in several shapes over its history and
//! no single request form works on every build. A write walks an ordered list
//! of [`Gen1Strategy`] values and stops at the first one the device accepts.
//! The order and the component routing table are configuration, not code.

use relay_client::HttpRequest;
use relay_params::on_off;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::protocol::SettingWrite;

/// One way of shaping a Gen1 settings write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gen1Strategy {
    /// `GET <endpoint>?<key>=<value>`
    SettingsQuery,
    /// `GET /settings/<key>?value=<value>`
    DirectSettingsPath,
    /// `GET <endpoint>?<key>=<value>` with percent-encoding
    UrlEncodedQuery,
    /// `POST <endpoint>` with a form body
    FormPost,
    /// `GET` against the component endpoint named by a [`ComponentRoute`]
    ComponentEndpoint,
    /// `GET <endpoint>?<key>=on|off`, booleans only
    BooleanOnOff,
    /// `GET <endpoint>?<key>=<value>&save=1`
    SaveFlag,
}

impl Gen1Strategy {
    /// Order used when the configuration does not name one
    pub fn default_order() -> Vec<Self> {
        vec![
            Self::SettingsQuery,
            Self::DirectSettingsPath,
            Self::UrlEncodedQuery,
            Self::FormPost,
            Self::ComponentEndpoint,
            Self::BooleanOnOff,
            Self::SaveFlag,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SettingsQuery => "settings_query",
            Self::DirectSettingsPath => "direct_settings_path",
            Self::UrlEncodedQuery => "url_encoded_query",
            Self::FormPost => "form_post",
            Self::ComponentEndpoint => "component_endpoint",
            Self::BooleanOnOff => "boolean_on_off",
            Self::SaveFlag => "save_flag",
        }
    }

    /// Request for this strategy, or `None` when it does not apply
    pub fn request(&self, write: &SettingWrite, routes: &[ComponentRoute]) -> Option<HttpRequest> {
        let query = || HttpRequest::get(&write.endpoint).with_query(&write.key, &write.encoded);
        let request = match self {
            Self::SettingsQuery => query(),
            Self::DirectSettingsPath => HttpRequest::get(format!("/settings/{}", write.key))
                .with_query("value", &write.encoded),
            Self::UrlEncodedQuery => query().encoded(),
            Self::FormPost => HttpRequest::post_form(
                &write.endpoint,
                vec![(write.key.clone(), write.encoded.clone())],
            ),
            Self::ComponentEndpoint => {
                let (endpoint, key) = routes.iter().find_map(|r| r.resolve(&write.name))?;
                HttpRequest::get(endpoint).with_query(key, &write.encoded)
            }
            Self::BooleanOnOff => match write.value {
                Value::Bool(b) => {
                    HttpRequest::get(&write.endpoint).with_query(&write.key, on_off(b))
                }
                _ => return None,
            },
            Self::SaveFlag => query().with_query("save", "1"),
        };
        Some(request)
    }
}

impl std::fmt::Display for Gen1Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether two requests put the same bytes on the wire
pub(crate) fn same_wire(a: &HttpRequest, b: &HttpRequest) -> bool {
    a.method == b.method
        && a.path == b.path
        && a.query_string() == b.query_string()
        && a.body == b.body
}

/// Routes parameter names with a known prefix to a component endpoint
///
/// `relay_0_default_state` with prefix `relay_`, endpoint
/// `/settings/relay/{index}` and `indexed = true` becomes
/// `/settings/relay/0?default_state=...`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRoute {
    /// Name prefix, e.g. `relay_` or `mqtt_`
    pub prefix: String,
    /// Endpoint; `{index}` is replaced by the instance number when indexed
    pub endpoint: String,
    /// Name continues with `<n>_` after the prefix
    #[serde(default)]
    pub indexed: bool,
    /// Send the name without its prefix as the query key
    #[serde(default = "default_strip_prefix")]
    pub strip_prefix: bool,
}

fn default_strip_prefix() -> bool {
    true
}

impl ComponentRoute {
    pub fn new(prefix: &str, endpoint: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            endpoint: endpoint.to_string(),
            indexed: false,
            strip_prefix: true,
        }
    }

    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    pub fn keep_prefix(mut self) -> Self {
        self.strip_prefix = false;
        self
    }

    /// Built-in routes for the stock Gen1 settings tree
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("relay_", "/settings/relay/{index}").indexed(),
            Self::new("relays_", "/settings/relay/{index}").indexed(),
            Self::new("light_", "/settings/light/{index}").indexed(),
            Self::new("lights_", "/settings/light/{index}").indexed(),
            Self::new("mqtt_", "/settings/mqtt").keep_prefix(),
            Self::new("sta_", "/settings/sta"),
            Self::new("ap_", "/settings/ap"),
            Self::new("cloud_", "/settings/cloud"),
            Self::new("login_", "/settings/login"),
        ]
    }

    /// Endpoint and query key for a parameter name, if this route matches
    pub fn resolve(&self, name: &str) -> Option<(String, String)> {
        let rest = name.strip_prefix(self.prefix.as_str())?;
        let (endpoint, key) = if self.indexed {
            let (index, field) = rest.split_once('_')?;
            index.parse::<usize>().ok()?;
            (self.endpoint.replace("{index}", index), field.to_string())
        } else if self.strip_prefix {
            (self.endpoint.clone(), rest.to_string())
        } else {
            (self.endpoint.clone(), name.to_string())
        };
        (!key.is_empty()).then_some((endpoint, key))
    }
}
