//! Error types for the proxy client.
//!
//! # Design
//! Every failure a caller can observe travels through `ProxyError`, either
//! returned synchronously (construction, request building) or as the `Err`
//! of a dispatch future. Non-2xx responses keep their raw status and body so
//! callers can inspect what the proxy or origin said.
//!
//! A malformed `Link` entry is not a `ProxyError`: the entry is dropped and
//! the reason is logged as a `LinkParseError`.

use thiserror::Error;

/// Errors returned by `ProxyClient` and `Dispatcher`.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Invalid protocol, unparsable option, or no token/config at all.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The underlying HTTP exchange failed before a response arrived.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response carried a non-2xx status.
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),
}

impl ProxyError {
    /// Status code of an `HttpStatus` error, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProxyError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Why a single `Link` header entry was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkParseError {
    #[error("link entry has no <target>: {0:?}")]
    MissingTarget(String),

    #[error("link entry has no rel attribute: {0:?}")]
    MissingRel(String),
}
