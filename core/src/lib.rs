//! Key-value store client routed through a reverse proxy.
//!
//! # Overview
//! The store's own client supplies data operations, content type and status
//! validation (`BaseCapability`). This crate owns what changes when the
//! store sits behind a proxy: where requests go (`UrlBuilder`), how they
//! authenticate (Basic auth with the token as user name), and how responses
//! are post-processed (header normalization and `Link` parsing).
//!
//! # Design
//! - `ProxyClient` is I/O free: `build_request` / `process_response` mirror
//!   the two sides of one HTTP exchange, so hosts can run the exchange
//!   themselves (see the `kvproxy-ffi` crate).
//! - `Dispatcher` adds a `Transport` and returns one future per request,
//!   chaining validate → normalize → parse-links.
//! - Transport differences (string vs map headers, whether `User-Agent` may
//!   be sent) are declared by the transport, never probed at runtime.

pub mod base;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod headers;
pub mod http;
pub mod links;
#[cfg(feature = "reqwest")]
pub mod transport;
pub mod url;

pub use base::{BaseCapability, StoreDefaults};
pub use client::{ProxyClient, ResponseParts};
pub use config::{ClientConfig, ClientOptions, ConfigOptions, Protocol};
pub use dispatch::{Dispatcher, ResponseEnvelope};
pub use error::{LinkParseError, ProxyError};
pub use headers::{normalize_headers, Headers};
pub use http::{Method, RawHeaders, RequestSpec, Transport, TransportProfile, TransportResponse};
pub use links::{parse_link_header, parse_links, FetchFn, Link, LinkDescriptor};
#[cfg(feature = "reqwest")]
pub use transport::ReqwestTransport;
pub use url::{Query, UrlBuilder};
