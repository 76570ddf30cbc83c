//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Each type mirrors a core type but uses C-compatible representations:
//! `*mut c_char` instead of `String`, pointer + length instead of `Vec` or
//! maps, and enums with explicit discriminants. Conversion functions live
//! here to keep `lib.rs` focused on the `extern "C"` surface.
//!
//! Strings handed to C are NUL-terminated; a Rust string that contains an
//! interior NUL is handed over as an empty string.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use kvproxy_core::{Headers, LinkDescriptor, Method, ProxyError, RequestSpec, ResponseParts};

/// Opaque handle to a `ProxyClient`. C callers receive a pointer to this
/// and pass it back into every FFI function.
pub struct FfiProxyClient {
    pub(crate) inner: kvproxy_core::ProxyClient,
}

pub(crate) fn to_c_string(s: impl Into<Vec<u8>>) -> *mut c_char {
    CString::new(s).unwrap_or_default().into_raw()
}

/// Borrow a caller-owned C string. Null or invalid UTF-8 gives `None`.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that outlives the
/// returned borrow.
pub(crate) unsafe fn borrow_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

/// Release a string previously produced by `to_c_string`. Null is ignored.
pub(crate) fn free_c_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(unsafe { CString::from_raw(ptr) });
    }
}

// ---------------------------------------------------------------------------
// Client configuration (caller-provided)
// ---------------------------------------------------------------------------

/// Configuration record. Null string fields are unset; a negative `port`
/// is unset.
#[repr(C)]
pub struct FfiClientOptions {
    pub protocol: *const c_char,
    pub host: *const c_char,
    pub port: i32,
    pub prefix: *const c_char,
    pub token: *const c_char,
}

/// One query parameter. A null `value` is absent and never rendered.
#[repr(C)]
pub struct FfiQueryParam {
    pub key: *const c_char,
    pub value: *const c_char,
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// HTTP method as a C enum.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiHttpMethod {
    Get = 0,
    Post = 1,
    Put = 2,
    Patch = 3,
    Delete = 4,
    Head = 5,
}

impl From<Method> for FfiHttpMethod {
    fn from(m: Method) -> Self {
        match m {
            Method::Get => FfiHttpMethod::Get,
            Method::Post => FfiHttpMethod::Post,
            Method::Put => FfiHttpMethod::Put,
            Method::Patch => FfiHttpMethod::Patch,
            Method::Delete => FfiHttpMethod::Delete,
            Method::Head => FfiHttpMethod::Head,
        }
    }
}

impl From<FfiHttpMethod> for Method {
    fn from(m: FfiHttpMethod) -> Self {
        match m {
            FfiHttpMethod::Get => Method::Get,
            FfiHttpMethod::Post => Method::Post,
            FfiHttpMethod::Put => Method::Put,
            FfiHttpMethod::Patch => Method::Patch,
            FfiHttpMethod::Delete => Method::Delete,
            FfiHttpMethod::Head => Method::Head,
        }
    }
}

/// A single HTTP header (or link attribute) as a key-value pair of C strings.
#[repr(C)]
pub struct FfiHeader {
    pub key: *mut c_char,
    pub value: *mut c_char,
}

/// Heap-allocated array of `FfiHeader`. `items` is null when `len` is 0.
#[repr(C)]
pub struct FfiHeaderList {
    pub items: *mut FfiHeader,
    pub len: u32,
}

impl FfiHeaderList {
    pub(crate) fn empty() -> Self {
        FfiHeaderList {
            items: std::ptr::null_mut(),
            len: 0,
        }
    }

    pub(crate) fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let items: Vec<FfiHeader> = pairs
            .into_iter()
            .map(|(k, v)| FfiHeader {
                key: to_c_string(k),
                value: to_c_string(v),
            })
            .collect();
        if items.is_empty() {
            return Self::empty();
        }
        let len = items.len() as u32;
        let items = Box::into_raw(items.into_boxed_slice()) as *mut FfiHeader;
        FfiHeaderList { items, len }
    }

    /// Free every string and the array itself, leaving the list empty.
    pub(crate) fn release(&mut self) {
        if self.items.is_null() {
            return;
        }
        let slice = std::ptr::slice_from_raw_parts_mut(self.items, self.len as usize);
        let items = unsafe { Box::from_raw(slice) };
        for header in items.iter() {
            free_c_string(header.key);
            free_c_string(header.value);
        }
        *self = Self::empty();
    }
}

/// An HTTP request described as C-compatible plain data.
///
/// Built by `kvp_build_request`. The C caller executes the request and
/// passes the response back through `kvp_process_response`.
#[repr(C)]
pub struct FfiHttpRequest {
    pub method: FfiHttpMethod,
    pub url: *mut c_char,
    pub headers: FfiHeaderList,
    /// JSON text, or null when the request has no body.
    pub body: *mut c_char,
}

impl FfiHttpRequest {
    /// Convert a core `RequestSpec` into a heap-allocated `FfiHttpRequest`.
    pub(crate) fn from_core(req: RequestSpec) -> *mut Self {
        let body = match req.body {
            Some(b) => to_c_string(b),
            None => std::ptr::null_mut(),
        };
        let ffi_req = Box::new(FfiHttpRequest {
            method: req.method.into(),
            url: to_c_string(req.url),
            headers: FfiHeaderList::from_pairs(req.headers),
            body,
        });
        Box::into_raw(ffi_req)
    }
}

// ---------------------------------------------------------------------------
// Response input (caller-provided, not heap-allocated by us)
// ---------------------------------------------------------------------------

/// An HTTP response described as C-compatible plain data.
///
/// Headers arrive as one CRLF-joined `Key: Value` blob, the string header
/// model. The FFI layer reads but does not free these fields.
#[repr(C)]
pub struct FfiHttpResponse {
    pub status: u16,
    pub headers: *const c_char,
    pub body: *const c_char,
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Error codes returned in `FfiResponseResult`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    Configuration = 1,
    Transport = 2,
    Http = 3,
    Serialization = 4,
    Deserialization = 5,
    Panic = 6,
    NullArg = 7,
}

impl From<&ProxyError> for FfiErrorCode {
    fn from(e: &ProxyError) -> Self {
        match e {
            ProxyError::Configuration(_) => FfiErrorCode::Configuration,
            ProxyError::Transport(_) => FfiErrorCode::Transport,
            ProxyError::HttpStatus { .. } => FfiErrorCode::Http,
            ProxyError::Serialization(_) => FfiErrorCode::Serialization,
            ProxyError::Deserialization(_) => FfiErrorCode::Deserialization,
        }
    }
}

/// One parsed `Link` entry exposed to C. `params` holds every attribute
/// other than `rel`.
#[repr(C)]
pub struct FfiLink {
    pub url: *mut c_char,
    pub rel: *mut c_char,
    pub params: FfiHeaderList,
}

/// Result envelope for `kvp_process_response`.
///
/// On success `error_code` is `Ok`, `error_message` is null, and `body`,
/// `headers` and `links` describe the response. On failure `error_code`
/// names the category, `error_message` is a human-readable C string,
/// `http_status` is set for `Http` errors, and `body` carries the error body
/// for `Http` errors (null otherwise).
#[repr(C)]
pub struct FfiResponseResult {
    pub error_code: FfiErrorCode,
    pub error_message: *mut c_char,
    pub http_status: u16,
    pub body: *mut c_char,
    pub headers: FfiHeaderList,
    pub links: *mut FfiLink,
    pub links_len: u32,
}

impl FfiResponseResult {
    /// Build a success result from processed response parts.
    pub(crate) fn ok(parts: ResponseParts) -> *mut Self {
        let links: Vec<FfiLink> = parts.links.into_iter().map(ffi_link).collect();
        let links_len = links.len() as u32;
        let links = if links.is_empty() {
            std::ptr::null_mut()
        } else {
            Box::into_raw(links.into_boxed_slice()) as *mut FfiLink
        };
        Box::into_raw(Box::new(FfiResponseResult {
            error_code: FfiErrorCode::Ok,
            error_message: std::ptr::null_mut(),
            http_status: parts.status,
            body: to_c_string(parts.body),
            headers: FfiHeaderList::from_pairs(parts.headers),
            links,
            links_len,
        }))
    }

    /// Build an error result from a core `ProxyError`.
    pub(crate) fn from_error(error: ProxyError) -> *mut Self {
        let code = FfiErrorCode::from(&error);
        let message = error.to_string();
        let (status, body) = match error {
            ProxyError::HttpStatus { status, body } => (status, to_c_string(body)),
            _ => (0, std::ptr::null_mut()),
        };
        Box::into_raw(Box::new(FfiResponseResult {
            error_code: code,
            error_message: to_c_string(message),
            http_status: status,
            body,
            headers: FfiHeaderList::empty(),
            links: std::ptr::null_mut(),
            links_len: 0,
        }))
    }

    /// Build an error result with a specific code and message.
    pub(crate) fn error(code: FfiErrorCode, message: &str) -> *mut Self {
        Box::into_raw(Box::new(FfiResponseResult {
            error_code: code,
            error_message: to_c_string(message),
            http_status: 0,
            body: std::ptr::null_mut(),
            headers: FfiHeaderList::empty(),
            links: std::ptr::null_mut(),
            links_len: 0,
        }))
    }
}

fn ffi_link(link: LinkDescriptor) -> FfiLink {
    FfiLink {
        url: to_c_string(link.url),
        rel: to_c_string(link.rel),
        params: FfiHeaderList::from_pairs(link.params),
    }
}

/// Collect caller-provided header pairs. Pairs with a null or non-UTF-8
/// key or value are skipped.
///
/// # Safety
/// `headers` must be null or point to `len` valid `FfiHeader` values whose
/// strings are NUL-terminated.
pub(crate) unsafe fn headers_from_c(headers: *const FfiHeader, len: u32) -> Headers {
    let mut out = Headers::new();
    if headers.is_null() {
        return out;
    }
    let pairs = unsafe { std::slice::from_raw_parts(headers, len as usize) };
    for pair in pairs {
        let key = unsafe { borrow_str(pair.key) };
        let value = unsafe { borrow_str(pair.value) };
        if let (Some(key), Some(value)) = (key, value) {
            out.insert(key.to_string(), value.to_string());
        }
    }
    out
}
