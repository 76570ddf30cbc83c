//! HTTP transport types and the transport seam.
//!
//! # Design
//! Requests and responses are plain data. `ProxyClient` builds a
//! `RequestSpec` and consumes a `TransportResponse` without touching the
//! network; a `Transport` implementation (or a host across the C ABI)
//! performs the actual exchange in between.
//!
//! Transports differ in how they expose response headers: a socket-level
//! client hands back a structured map, a browser-style request object only
//! offers one CRLF-joined string. `RawHeaders` carries whichever model the
//! transport has, and the pipeline normalizes the string form.

use std::fmt;

use futures::future::BoxFuture;

use crate::error::ProxyError;
use crate::headers::Headers;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully prepared HTTP request.
///
/// Built by `ProxyClient::build_request`. Headers already include the
/// defaults and any `Authorization` header; `body` is JSON text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    pub method: Method,
    pub url: String,
    pub headers: Headers,
    pub body: Option<String>,
}

/// Response headers in the model the transport produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawHeaders {
    /// Structured key/value map, as socket-level clients provide.
    Map(Headers),
    /// One CRLF-joined `Key: Value` blob, as browser-style request objects provide.
    Text(String),
}

impl Default for RawHeaders {
    fn default() -> Self {
        RawHeaders::Map(Headers::new())
    }
}

/// A raw HTTP response as returned by a transport, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: RawHeaders,
    pub body: String,
}

/// Capabilities of a transport that shape the outgoing request.
///
/// Decided once when the transport is constructed; nothing in the pipeline
/// probes the runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportProfile {
    /// Whether the transport may set `User-Agent`. Browser-style request
    /// objects forbid it.
    pub send_user_agent: bool,
}

impl TransportProfile {
    /// A direct-socket client: sends `User-Agent`.
    pub const fn native() -> Self {
        Self {
            send_user_agent: true,
        }
    }

    /// A browser-style request object: no `User-Agent`.
    pub const fn browser() -> Self {
        Self {
            send_user_agent: false,
        }
    }
}

impl Default for TransportProfile {
    fn default() -> Self {
        Self::native()
    }
}

/// Executes one HTTP exchange.
///
/// Implementations must issue exactly one request per call and must not
/// retry; a failure before any response arrives is `ProxyError::Transport`.
/// Non-2xx responses are returned as `Ok` so the pipeline can validate them.
pub trait Transport: Send + Sync {
    fn profile(&self) -> TransportProfile {
        TransportProfile::native()
    }

    fn execute(
        &self,
        request: RequestSpec,
    ) -> BoxFuture<'static, Result<TransportResponse, ProxyError>>;
}
