//! Stateless request builder and response processor for the proxy.
//!
//! # Design
//! `ProxyClient` holds only immutable data: the resolved config, the base
//! capability and the transport profile. It never performs I/O. A request
//! goes through `build_request`, the host (or a `Dispatcher`) executes it,
//! and the raw response comes back through `process_response`, which runs
//! validation, header normalization and link parsing in that order.

use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;

use crate::base::{BaseCapability, StoreDefaults};
use crate::config::{ClientConfig, ClientOptions, ConfigOptions};
use crate::error::ProxyError;
use crate::headers::{has_header, normalize_headers, Headers};
use crate::http::{Method, RawHeaders, RequestSpec, TransportProfile, TransportResponse};
use crate::links::{link_descriptors, LinkDescriptor};
use crate::url::{Query, UrlBuilder};

pub const CONTENT_TYPE: &str = "Content-Type";
pub const USER_AGENT: &str = "User-Agent";
pub const AUTHORIZATION: &str = "Authorization";

/// A validated response with normalized headers and its link descriptors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseParts {
    pub status: u16,
    pub headers: Headers,
    pub body: String,
    pub links: Vec<LinkDescriptor>,
}

/// Synchronous, I/O-free core of the proxy client.
#[derive(Clone)]
pub struct ProxyClient {
    config: Arc<ClientConfig>,
    base: Arc<dyn BaseCapability>,
    urls: UrlBuilder,
    profile: TransportProfile,
}

impl ProxyClient {
    /// Build a client on top of the stock store defaults.
    pub fn new(options: impl Into<ClientOptions>) -> Result<Self, ProxyError> {
        Self::with_base(options, Arc::new(StoreDefaults::new()))
    }

    pub fn with_base(
        options: impl Into<ClientOptions>,
        base: Arc<dyn BaseCapability>,
    ) -> Result<Self, ProxyError> {
        let config = ClientConfig::resolve(options.into(), base.api_endpoint())?;
        let urls = UrlBuilder::new(&config, base.api_version());
        Ok(Self {
            config: Arc::new(config),
            base,
            urls,
            profile: TransportProfile::default(),
        })
    }

    /// Build a client from the `KVPROXY_*` environment variables. Fails when
    /// none are set.
    pub fn from_env() -> Result<Self, ProxyError> {
        match ConfigOptions::from_env()? {
            Some(options) => Self::new(options),
            None => Err(ProxyError::Configuration(
                "API key or configuration object required".to_string(),
            )),
        }
    }

    pub fn with_profile(mut self, profile: TransportProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn base(&self) -> &dyn BaseCapability {
        self.base.as_ref()
    }

    pub fn profile(&self) -> TransportProfile {
        self.profile
    }

    pub fn url_builder(&self) -> &UrlBuilder {
        &self.urls
    }

    pub fn generate_api_url<S: AsRef<str>>(&self, path: &[S], query: Option<&Query>) -> String {
        self.urls.generate_api_url(path, query)
    }

    /// Prepare a request: default headers, auth, and the JSON body.
    ///
    /// Caller headers win over the `Content-Type` default. `User-Agent` is
    /// set only when the transport profile allows it, and together with
    /// `Authorization` replaces any caller header of the same name in any
    /// case. An absent body yields no payload.
    pub fn build_request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        body: Option<&B>,
        headers: Option<Headers>,
    ) -> Result<RequestSpec, ProxyError> {
        let mut headers = headers.unwrap_or_default();
        if !has_header(&headers, CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE.to_string(), self.base.content_type().to_string());
        }
        if self.profile.send_user_agent {
            replace_header(&mut headers, USER_AGENT, self.base.user_agent().to_string());
        }
        if let Some(token) = self.config.auth_token() {
            replace_header(&mut headers, AUTHORIZATION, basic_auth(token));
        }

        let body = body
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| ProxyError::Serialization(e.to_string()))?;

        Ok(RequestSpec {
            method,
            url: url.to_string(),
            headers,
            body,
        })
    }

    /// Validate the status, normalize string headers, then parse links.
    pub fn process_response(
        &self,
        response: TransportResponse,
    ) -> Result<ResponseParts, ProxyError> {
        let response = self.base.validate_response(response)?;
        let headers = match response.headers {
            RawHeaders::Map(headers) => headers,
            RawHeaders::Text(raw) => normalize_headers(Some(&raw)),
        };
        let links = link_descriptors(&headers);
        Ok(ResponseParts {
            status: response.status,
            headers,
            body: response.body,
            links,
        })
    }
}

/// Insert `name`, dropping every existing key equal to it ignoring case.
fn replace_header(headers: &mut Headers, name: &str, value: String) {
    headers.retain(|key, _| !key.eq_ignore_ascii_case(name));
    headers.insert(name.to_string(), value);
}

impl fmt::Debug for ProxyClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyClient")
            .field("config", &self.config)
            .field("urls", &self.urls)
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}

/// `Basic base64(token:)`, the token as user name with an empty password.
fn basic_auth(token: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{token}:")))
}
