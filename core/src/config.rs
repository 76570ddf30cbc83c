//! Client configuration.
//!
//! # Design
//! Callers hand in `ClientOptions`, either a bare token or a partial
//! `ConfigOptions` record, and `ClientConfig::resolve` turns it into the
//! immutable `ClientConfig` the pipeline reads. All validation happens here,
//! before any request exists.

use std::env;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::ProxyError;

pub const ENV_TOKEN: &str = "KVPROXY_TOKEN";
pub const ENV_PROTOCOL: &str = "KVPROXY_PROTOCOL";
pub const ENV_HOST: &str = "KVPROXY_HOST";
pub const ENV_PORT: &str = "KVPROXY_PORT";
pub const ENV_PREFIX: &str = "KVPROXY_PREFIX";

/// URL scheme used to reach the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    Http,
    #[default]
    Https,
}

impl Protocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            other => Err(ProxyError::Configuration(format!(
                "API protocol must be \"http\" or \"https\", got {other:?}"
            ))),
        }
    }
}

/// Partial configuration record. Every field is optional; unset fields fall
/// back to the base capability's defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigOptions {
    pub protocol: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub prefix: Option<String>,
    pub token: Option<String>,
}

impl ConfigOptions {
    /// Read `KVPROXY_*` variables. Returns `Ok(None)` when none are set.
    pub fn from_env() -> Result<Option<Self>, ProxyError> {
        let port = match env::var(ENV_PORT).ok() {
            Some(raw) => Some(raw.parse::<u16>().map_err(|e| {
                ProxyError::Configuration(format!("{ENV_PORT}={raw:?} is not a valid port: {e}"))
            })?),
            None => None,
        };
        let options = ConfigOptions {
            protocol: env::var(ENV_PROTOCOL).ok(),
            host: env::var(ENV_HOST).ok(),
            port,
            prefix: env::var(ENV_PREFIX).ok(),
            token: env::var(ENV_TOKEN).ok(),
        };
        if options == ConfigOptions::default() {
            return Ok(None);
        }
        Ok(Some(options))
    }

    /// A record needs a host or a non-empty token. A record carrying only
    /// `port`/`prefix` is rejected instead of silently targeting the store
    /// endpoint, which is stricter than older clients that accepted it.
    fn is_usable(&self) -> bool {
        self.host.is_some() || self.token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Constructor input: a bare token, or a configuration record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientOptions {
    Token(String),
    Config(ConfigOptions),
}

impl From<&str> for ClientOptions {
    fn from(token: &str) -> Self {
        ClientOptions::Token(token.to_string())
    }
}

impl From<String> for ClientOptions {
    fn from(token: String) -> Self {
        ClientOptions::Token(token)
    }
}

impl From<ConfigOptions> for ClientOptions {
    fn from(options: ConfigOptions) -> Self {
        ClientOptions::Config(options)
    }
}

/// Resolved, immutable client configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub protocol: Protocol,
    pub host: String,
    pub port: Option<u16>,
    pub prefix: Option<String>,
    pub token: Option<String>,
}

impl ClientConfig {
    /// Validate `options` against `default_host`.
    ///
    /// A bare token targets the default host over https. A record needs at
    /// least a host or a non-empty token; an empty record or empty token is
    /// a configuration error.
    pub fn resolve(options: ClientOptions, default_host: &str) -> Result<Self, ProxyError> {
        match options {
            ClientOptions::Token(token) => {
                if token.is_empty() {
                    return Err(ProxyError::Configuration(
                        "API key or configuration object required".to_string(),
                    ));
                }
                Ok(ClientConfig {
                    protocol: Protocol::Https,
                    host: default_host.to_string(),
                    port: None,
                    prefix: None,
                    token: Some(token),
                })
            }
            ClientOptions::Config(options) => {
                if !options.is_usable() {
                    return Err(ProxyError::Configuration(
                        "API key or configuration object required".to_string(),
                    ));
                }
                let protocol = match options.protocol.as_deref() {
                    Some(raw) => raw.parse()?,
                    None => Protocol::default(),
                };
                Ok(ClientConfig {
                    protocol,
                    host: options.host.unwrap_or_else(|| default_host.to_string()),
                    port: options.port,
                    prefix: options.prefix,
                    token: options.token,
                })
            }
        }
    }

    /// The token to authenticate with, if it is non-empty.
    pub fn auth_token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("protocol", &self.protocol)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("prefix", &self.prefix)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
