//! `reqwest`-backed transport.
//!
//! A direct-socket client: headers come back as a structured map and
//! `User-Agent` may be sent. Timeouts and pooling are whatever the wrapped
//! `reqwest::Client` was built with.

use futures::future::{BoxFuture, FutureExt};
use reqwest::header::HeaderMap;

use crate::error::ProxyError;
use crate::headers::Headers;
use crate::http::{
    Method, RawHeaders, RequestSpec, Transport, TransportProfile, TransportResponse,
};

#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
        Method::Head => reqwest::Method::HEAD,
    }
}

/// Flatten a response header map. Repeated fields are joined with `", "`,
/// the way HTTP combines them, so every `Link` field survives.
fn collect_headers(map: &HeaderMap) -> Headers {
    let mut headers = Headers::new();
    for name in map.keys() {
        // Non-UTF-8 values cannot carry anything the pipeline reads.
        let values: Vec<&str> = map
            .get_all(name)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect();
        if !values.is_empty() {
            headers.insert(name.as_str().to_string(), values.join(", "));
        }
    }
    headers
}

impl Transport for ReqwestTransport {
    fn profile(&self) -> TransportProfile {
        TransportProfile::native()
    }

    fn execute(
        &self,
        request: RequestSpec,
    ) -> BoxFuture<'static, Result<TransportResponse, ProxyError>> {
        let mut builder = self
            .client
            .request(reqwest_method(request.method), request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        async move {
            let response = builder
                .send()
                .await
                .map_err(|e| ProxyError::Transport(e.to_string()))?;
            let status = response.status().as_u16();
            let headers = collect_headers(response.headers());
            let body = response
                .text()
                .await
                .map_err(|e| ProxyError::Transport(e.to_string()))?;
            Ok(TransportResponse {
                status,
                headers: RawHeaders::Map(headers),
                body,
            })
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderValue, CONTENT_TYPE, LINK};

    use crate::links::link_descriptors;

    #[test]
    fn repeated_link_fields_are_combined() {
        let mut map = HeaderMap::new();
        map.append(LINK, HeaderValue::from_static(r#"<https://x/a>; rel="next""#));
        map.append(LINK, HeaderValue::from_static(r#"<https://x/b>; rel="prev""#));
        map.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let headers = collect_headers(&map);
        assert_eq!(
            headers.get("link").map(String::as_str),
            Some(r#"<https://x/a>; rel="next", <https://x/b>; rel="prev""#)
        );
        assert_eq!(headers.get("content-type").map(String::as_str), Some("application/json"));

        let rels: Vec<String> = link_descriptors(&headers).into_iter().map(|l| l.rel).collect();
        assert_eq!(rels, ["next", "prev"]);
    }

    #[test]
    fn non_utf8_values_are_dropped() {
        let mut map = HeaderMap::new();
        map.insert("x-raw", HeaderValue::from_bytes(b"\xff\xfe").unwrap());
        map.insert("x-ok", HeaderValue::from_static("1"));

        let headers = collect_headers(&map);
        assert!(!headers.contains_key("x-raw"));
        assert_eq!(headers.get("x-ok").map(String::as_str), Some("1"));
    }
}
