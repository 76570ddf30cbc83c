//! C-ABI wrapper around `kvproxy-core`.
//!
//! # Overview
//! Exposes the synchronous half of the proxy pipeline through `extern "C"`
//! functions so any language with a C FFI can compose proxy URLs, build
//! authenticated requests and post-process responses without linking to
//! Rust's async runtime. The C host performs the HTTP exchange itself.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary. The client handle holds trait objects,
//!   so closures touching it are wrapped in `AssertUnwindSafe`; a panic
//!   leaves no partially mutated state because the handle is read-only.
//! - Responses come in with headers as one CRLF blob (the string header
//!   model) and leave as a `FfiResponseResult` carrying normalized headers
//!   and parsed links.
//! - The C caller owns all returned pointers and must call the matching
//!   `kvp_free_*` function to release them.

pub mod types;

use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};

use kvproxy_core::{
    normalize_headers, ConfigOptions, ProxyClient, Query, RawHeaders, TransportResponse,
};

use types::*;

// ---------------------------------------------------------------------------
// Client lifecycle
// ---------------------------------------------------------------------------

/// Create a `ProxyClient` from a bare token, targeting the store's default
/// endpoint over https.
///
/// Returns null if `token` is null, empty, or not UTF-8.
/// The caller must free the returned pointer with `kvp_client_free`.
#[unsafe(no_mangle)]
pub extern "C" fn kvp_client_new(token: *const c_char) -> *mut FfiProxyClient {
    catch_unwind(|| {
        let Some(token) = (unsafe { borrow_str(token) }) else {
            return std::ptr::null_mut();
        };
        match ProxyClient::new(token) {
            Ok(inner) => Box::into_raw(Box::new(FfiProxyClient { inner })),
            Err(_) => std::ptr::null_mut(),
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Create a `ProxyClient` from a configuration record.
///
/// Returns null if `options` is null, the protocol is not `http`/`https`,
/// the port is above 65535, or neither a host nor a non-empty token is set.
#[unsafe(no_mangle)]
pub extern "C" fn kvp_client_new_with_options(
    options: *const FfiClientOptions,
) -> *mut FfiProxyClient {
    catch_unwind(|| {
        if options.is_null() {
            return std::ptr::null_mut();
        }
        let options = unsafe { &*options };
        let port = match options.port {
            p if p < 0 => None,
            p => match u16::try_from(p) {
                Ok(p) => Some(p),
                Err(_) => return std::ptr::null_mut(),
            },
        };
        let owned = |ptr: *const c_char| unsafe { borrow_str(ptr) }.map(str::to_string);
        let config = ConfigOptions {
            protocol: owned(options.protocol),
            host: owned(options.host),
            port,
            prefix: owned(options.prefix),
            token: owned(options.token),
        };
        match ProxyClient::new(config) {
            Ok(inner) => Box::into_raw(Box::new(FfiProxyClient { inner })),
            Err(_) => std::ptr::null_mut(),
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a client created by `kvp_client_new*`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn kvp_client_free(client: *mut FfiProxyClient) {
    if !client.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(client) });
        }));
    }
}

// ---------------------------------------------------------------------------
// URL composition
// ---------------------------------------------------------------------------

/// Compose a fully qualified API URL.
///
/// `segments` points to `segments_len` C strings, each percent-encoded on
/// its own. `query` points to `query_len` parameters; a null value is
/// dropped. Either array may be null when its length is 0.
///
/// Returns null if `client` is null or any segment or key is null or not
/// UTF-8. Free the result with `kvp_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn kvp_generate_api_url(
    client: *const FfiProxyClient,
    segments: *const *const c_char,
    segments_len: u32,
    query: *const FfiQueryParam,
    query_len: u32,
) -> *mut c_char {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };

        let mut path = Vec::with_capacity(segments_len as usize);
        if !segments.is_null() {
            for &segment in unsafe { std::slice::from_raw_parts(segments, segments_len as usize) } {
                match unsafe { borrow_str(segment) } {
                    Some(s) => path.push(s),
                    None => return std::ptr::null_mut(),
                }
            }
        }

        let mut params = Query::new();
        if !query.is_null() {
            for param in unsafe { std::slice::from_raw_parts(query, query_len as usize) } {
                let Some(key) = (unsafe { borrow_str(param.key) }) else {
                    return std::ptr::null_mut();
                };
                params = params.opt_param(key, unsafe { borrow_str(param.value) });
            }
        }

        to_c_string(client.inner.generate_api_url(&path, Some(&params)))
    }))
    .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Request building
// ---------------------------------------------------------------------------

/// Build a request with default headers, auth and body attached.
///
/// `body_json` is JSON text or null for no body. `headers` points to
/// `headers_len` caller headers (may be null); a caller `Content-Type`
/// replaces the default.
///
/// Returns null if `client` or `url` is null, or `body_json` is not valid
/// JSON. Free the result with `kvp_free_request`.
#[unsafe(no_mangle)]
pub extern "C" fn kvp_build_request(
    client: *const FfiProxyClient,
    method: FfiHttpMethod,
    url: *const c_char,
    body_json: *const c_char,
    headers: *const FfiHeader,
    headers_len: u32,
) -> *mut FfiHttpRequest {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };
        let Some(url) = (unsafe { borrow_str(url) }) else {
            return std::ptr::null_mut();
        };
        let body: Option<serde_json::Value> = if body_json.is_null() {
            None
        } else {
            let parsed = unsafe { borrow_str(body_json) }
                .and_then(|text| serde_json::from_str(text).ok());
            match parsed {
                Some(value) => Some(value),
                None => return std::ptr::null_mut(),
            }
        };
        let headers = unsafe { headers_from_c(headers, headers_len) };
        let headers = if headers.is_empty() { None } else { Some(headers) };

        match client.inner.build_request(method.into(), url, body.as_ref(), headers) {
            Ok(req) => FfiHttpRequest::from_core(req),
            Err(_) => std::ptr::null_mut(),
        }
    }))
    .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Response processing
// ---------------------------------------------------------------------------

/// Validate a response, normalize its header blob and parse its links.
///
/// Non-2xx responses yield `error_code = Http` with the status and body.
/// Malformed `Link` entries are skipped, not reported as errors.
#[unsafe(no_mangle)]
pub extern "C" fn kvp_process_response(
    client: *const FfiProxyClient,
    response: *const FfiHttpResponse,
) -> *mut FfiResponseResult {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return FfiResponseResult::error(FfiErrorCode::NullArg, "client is null");
        }
        if response.is_null() {
            return FfiResponseResult::error(FfiErrorCode::NullArg, "response is null");
        }
        let client = unsafe { &*client };
        let resp = unsafe { &*response };
        let core_resp = TransportResponse {
            status: resp.status,
            headers: RawHeaders::Text(
                unsafe { borrow_str(resp.headers) }
                    .unwrap_or("")
                    .to_string(),
            ),
            body: unsafe { borrow_str(resp.body) }.unwrap_or("").to_string(),
        };
        match client.inner.process_response(core_resp) {
            Ok(parts) => FfiResponseResult::ok(parts),
            Err(e) => FfiResponseResult::from_error(e),
        }
    }))
    .unwrap_or_else(|_| {
        FfiResponseResult::error(FfiErrorCode::Panic, "panic in kvp_process_response")
    })
}

/// Normalize a CRLF-joined header blob. Null gives an empty list.
/// Free the result with `kvp_free_header_list`.
#[unsafe(no_mangle)]
pub extern "C" fn kvp_normalize_headers(raw: *const c_char) -> *mut FfiHeaderList {
    catch_unwind(|| {
        let headers = normalize_headers(unsafe { borrow_str(raw) });
        Box::into_raw(Box::new(FfiHeaderList::from_pairs(headers)))
    })
    .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free an `FfiHttpRequest` returned by `kvp_build_request`.
/// Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn kvp_free_request(req: *mut FfiHttpRequest) {
    if req.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let mut req = unsafe { Box::from_raw(req) };
        free_c_string(req.url);
        free_c_string(req.body);
        req.headers.release();
    });
}

/// Free an `FfiResponseResult` returned by `kvp_process_response`.
/// Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn kvp_free_result(result: *mut FfiResponseResult) {
    if result.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let mut result = unsafe { Box::from_raw(result) };
        free_c_string(result.error_message);
        free_c_string(result.body);
        result.headers.release();
        if !result.links.is_null() {
            let slice = std::ptr::slice_from_raw_parts_mut(result.links, result.links_len as usize);
            let mut links = unsafe { Box::from_raw(slice) };
            for link in links.iter_mut() {
                free_c_string(link.url);
                free_c_string(link.rel);
                link.params.release();
            }
        }
    });
}

/// Free an `FfiHeaderList` returned by `kvp_normalize_headers`.
/// Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn kvp_free_header_list(list: *mut FfiHeaderList) {
    if list.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let mut list = unsafe { Box::from_raw(list) };
        list.release();
    });
}

/// Free a string returned by `kvp_generate_api_url`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn kvp_free_string(s: *mut c_char) {
    let _ = catch_unwind(|| free_c_string(s));
}
