//! Hypermedia `Link` header parsing.
//!
//! # Design
//! Parsing is split in two. `parse_link_header` is pure and produces
//! `LinkDescriptor` data, which is all the C ABI needs. `parse_links` binds
//! each descriptor to a fetch closure so async callers can follow the
//! relation with `Link::get()`.
//!
//! A malformed entry never fails the response: it is dropped and logged.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::dispatch::ResponseEnvelope;
use crate::error::{LinkParseError, ProxyError};
use crate::headers::{get_header, Headers};

pub const LINK_HEADER: &str = "Link";

/// Issues a `GET` for a link target and resolves to the new response.
pub type FetchFn =
    Arc<dyn Fn(String) -> BoxFuture<'static, Result<ResponseEnvelope, ProxyError>> + Send + Sync>;

/// One parsed `Link` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkDescriptor {
    pub url: String,
    pub rel: String,
    /// Every attribute other than `rel`, e.g. `title` or `type`.
    pub params: BTreeMap<String, String>,
}

/// A link descriptor bound to the dispatcher that produced it.
#[derive(Clone)]
pub struct Link {
    descriptor: LinkDescriptor,
    fetch: FetchFn,
}

impl Link {
    pub fn new(descriptor: LinkDescriptor, fetch: FetchFn) -> Self {
        Self { descriptor, fetch }
    }

    /// Follow the link: `GET` its target with no body.
    pub fn get(&self) -> BoxFuture<'static, Result<ResponseEnvelope, ProxyError>> {
        (self.fetch)(self.descriptor.url.clone())
    }

    pub fn descriptor(&self) -> &LinkDescriptor {
        &self.descriptor
    }

    pub fn into_descriptor(self) -> LinkDescriptor {
        self.descriptor
    }
}

impl Deref for Link {
    type Target = LinkDescriptor;

    fn deref(&self) -> &LinkDescriptor {
        &self.descriptor
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link")
            .field("url", &self.descriptor.url)
            .field("rel", &self.descriptor.rel)
            .field("params", &self.descriptor.params)
            .finish_non_exhaustive()
    }
}

/// Parse the `Link` header of `headers` and bind every entry to `fetch`.
pub fn parse_links(headers: &Headers, fetch: &FetchFn) -> Vec<Link> {
    link_descriptors(headers)
        .into_iter()
        .map(|descriptor| Link::new(descriptor, Arc::clone(fetch)))
        .collect()
}

/// Descriptors from the `Link` header of `headers`, empty when absent.
pub fn link_descriptors(headers: &Headers) -> Vec<LinkDescriptor> {
    match get_header(headers, LINK_HEADER) {
        Some(value) => parse_link_header(value),
        None => Vec::new(),
    }
}

/// Parse a full `Link` header value, keeping header order and skipping
/// malformed entries.
pub fn parse_link_header(value: &str) -> Vec<LinkDescriptor> {
    split_outside(value, ',')
        .into_iter()
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match parse_link_entry(entry) {
            Ok(descriptor) => Some(descriptor),
            Err(error) => {
                tracing::warn!(%error, "skipping malformed Link entry");
                None
            }
        })
        .collect()
}

/// Parse one `<url>; rel="name"[; key="value"]*` entry.
///
/// The first occurrence of an attribute wins. Attributes without `=` are
/// ignored.
pub fn parse_link_entry(entry: &str) -> Result<LinkDescriptor, LinkParseError> {
    let entry = entry.trim();
    let target = entry
        .strip_prefix('<')
        .and_then(|rest| rest.split_once('>'));
    let Some((url, attributes)) = target else {
        return Err(LinkParseError::MissingTarget(entry.to_string()));
    };

    let mut rel = None;
    let mut params = BTreeMap::new();
    for attribute in split_outside(attributes, ';') {
        let Some((key, value)) = attribute.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = unquote(value.trim());
        if key.eq_ignore_ascii_case("rel") {
            rel.get_or_insert_with(|| value.to_string());
        } else if !key.is_empty() {
            params.entry(key.to_string()).or_insert_with(|| value.to_string());
        }
    }

    match rel {
        Some(rel) if !rel.is_empty() => Ok(LinkDescriptor {
            url: url.trim().to_string(),
            rel,
            params,
        }),
        _ => Err(LinkParseError::MissingRel(entry.to_string())),
    }
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Split on `separator` where it is not inside `<...>` or `"..."`.
fn split_outside(input: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_target = false;
    let mut in_quotes = false;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        match c {
            '<' if !in_quotes => in_target = true,
            '>' if !in_quotes => in_target = false,
            '"' if !in_target => in_quotes = !in_quotes,
            c if c == separator && !in_target && !in_quotes => {
                parts.push(&input[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}
