//! API URL composition.
//!
//! # Design
//! `UrlBuilder` is computed once from the resolved config and the base
//! capability's API version, then produces URLs as a pure function of the
//! path segments and query. Segments, query keys and query values share one
//! percent-encoding set, the unreserved characters of `encodeURIComponent`,
//! so any segment survives a decode unchanged, including `/`, `?` and `%`.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::{Map, Value};

use crate::config::{ClientConfig, Protocol};

/// Everything except `A-Z a-z 0-9 - _ . ! ~ * ' ( )` is escaped.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

fn encode_component(raw: &str) -> String {
    utf8_percent_encode(raw, COMPONENT).to_string()
}

/// Ordered query parameters. Entries whose value is `None` are kept here
/// but never rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    entries: Vec<(String, Option<String>)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.entries.push((key.into(), Some(value.to_string())));
        self
    }

    pub fn opt_param<V: ToString>(mut self, key: impl Into<String>, value: Option<V>) -> Self {
        self.entries.push((key.into(), value.map(|v| v.to_string())));
        self
    }

    /// Build from a JSON object. `null` counts as absent. Arrays expand to
    /// one entry per element; other non-string values use their JSON text.
    pub fn from_json(map: &Map<String, Value>) -> Self {
        let mut query = Query::new();
        for (key, value) in map {
            match value {
                Value::Array(items) => {
                    for item in items {
                        query.entries.push((key.clone(), json_query_value(item)));
                    }
                }
                other => query.entries.push((key.clone(), json_query_value(other))),
            }
        }
        query
    }

    pub fn entries(&self) -> &[(String, Option<String>)] {
        &self.entries
    }

    /// `key=value` pairs joined by `&`, or `None` when nothing is present.
    fn encode(&self) -> Option<String> {
        let pairs: Vec<String> = self
            .entries
            .iter()
            .filter_map(|(key, value)| {
                let value = value.as_deref()?;
                Some(format!("{}={}", encode_component(key), encode_component(value)))
            })
            .collect();
        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("&"))
        }
    }
}

fn json_query_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Composes fully qualified API URLs for one client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlBuilder {
    protocol: Protocol,
    /// `host[:port][prefix]`
    base: String,
    api_version: String,
}

impl UrlBuilder {
    pub fn new(config: &ClientConfig, api_version: &str) -> Self {
        let mut base = config.host.clone();
        if let Some(port) = config.port {
            base.push(':');
            base.push_str(&port.to_string());
        }
        if let Some(prefix) = &config.prefix {
            base.push_str(prefix);
        }
        Self {
            protocol: config.protocol,
            base,
            api_version: api_version.to_string(),
        }
    }

    /// `host[:port][prefix]/<api-version>`
    pub fn authority(&self) -> String {
        format!("{}/{}", self.base, self.api_version)
    }

    /// Build `<protocol>://<authority>/<seg>/<seg>...[?query]`.
    pub fn generate_api_url<S: AsRef<str>>(&self, path: &[S], query: Option<&Query>) -> String {
        let mut url = format!("{}://{}", self.protocol, self.authority());
        for segment in path {
            url.push('/');
            url.push_str(&encode_component(segment.as_ref()));
        }
        if let Some(encoded) = query.and_then(Query::encode) {
            url.push('?');
            url.push_str(&encoded);
        }
        url
    }

    /// Make a link target absolute. Targets starting with `/` are placed
    /// under `<protocol>://host[:port][prefix]`; anything else is returned
    /// as is.
    pub fn resolve(&self, target: &str) -> String {
        if target.starts_with('/') && !target.starts_with("//") {
            format!("{}://{}{}", self.protocol, self.base, target)
        } else {
            target.to_string()
        }
    }
}
