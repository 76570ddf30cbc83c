//! The base capability the proxy pipeline is composed with.
//!
//! The store's own client owns the content type, user agent, API version,
//! default endpoint and status validation. The proxy client only consumes
//! them through `BaseCapability`, so a different store client can be
//! plugged in without touching URL building or auth.

use crate::error::ProxyError;
use crate::http::TransportResponse;

pub const DEFAULT_CONTENT_TYPE: &str = "application/json";
pub const API_VERSION: &str = "v0";
pub const API_ENDPOINT: &str = "api.orchestrate.io";

pub trait BaseCapability: Send + Sync {
    /// Default `Content-Type` for outgoing requests.
    fn content_type(&self) -> &str {
        DEFAULT_CONTENT_TYPE
    }

    fn user_agent(&self) -> &str;

    /// Path segment placed after the host, port and prefix.
    fn api_version(&self) -> &str {
        API_VERSION
    }

    /// Host used when the configuration does not name one.
    fn api_endpoint(&self) -> &str {
        API_ENDPOINT
    }

    /// Reject any non-2xx response, carrying its status and body.
    fn validate_response(
        &self,
        response: TransportResponse,
    ) -> Result<TransportResponse, ProxyError> {
        if (200..300).contains(&response.status) {
            Ok(response)
        } else {
            Err(ProxyError::HttpStatus {
                status: response.status,
                body: response.body,
            })
        }
    }
}

/// Stock defaults of the key-value store client.
#[derive(Debug, Clone)]
pub struct StoreDefaults {
    user_agent: String,
}

impl StoreDefaults {
    pub fn new() -> Self {
        Self {
            user_agent: format!("kvproxy/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for StoreDefaults {
    fn default() -> Self {
        Self::new()
    }
}

impl BaseCapability for StoreDefaults {
    fn user_agent(&self) -> &str {
        &self.user_agent
    }
}
