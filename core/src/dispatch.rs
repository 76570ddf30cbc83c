//! Async request dispatch over a `Transport`.
//!
//! # Design
//! `Dispatcher` pairs a `ProxyClient` with a transport. Each call builds the
//! request synchronously, issues exactly one exchange, and chains
//! validate → normalize → parse-links on the result. Nothing is retried.
//!
//! Links on the returned envelope carry a closure over a clone of the
//! dispatcher (two `Arc`s), so following one reuses the same config and
//! transport without any shared mutable state.

use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::client::{ProxyClient, ResponseParts};
use crate::error::ProxyError;
use crate::headers::{get_header, Headers};
use crate::http::{Method, RequestSpec, Transport};
use crate::links::{FetchFn, Link};

/// A validated response with its links bound for traversal.
#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    pub status: u16,
    pub headers: Headers,
    pub body: String,
    pub links: Vec<Link>,
}

impl ResponseEnvelope {
    /// Deserialize the JSON body.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ProxyError> {
        serde_json::from_str(&self.body).map_err(|e| ProxyError::Deserialization(e.to_string()))
    }

    /// First link with relation `rel`.
    pub fn link(&self, rel: &str) -> Option<&Link> {
        self.links.iter().find(|link| link.rel == rel)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        get_header(&self.headers, name)
    }
}

/// Issues requests for a `ProxyClient` through a `Transport`.
#[derive(Clone)]
pub struct Dispatcher {
    client: ProxyClient,
    transport: Arc<dyn Transport>,
}

impl Dispatcher {
    /// The transport's profile replaces the client's.
    pub fn new(client: ProxyClient, transport: Arc<dyn Transport>) -> Self {
        let profile = transport.profile();
        Self {
            client: client.with_profile(profile),
            transport,
        }
    }

    pub fn client(&self) -> &ProxyClient {
        &self.client
    }

    /// Build and send one request.
    ///
    /// Request-building failures (body serialization) resolve the returned
    /// future to `Err` without touching the transport.
    pub fn dispatch<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        body: Option<&B>,
        headers: Option<Headers>,
    ) -> BoxFuture<'static, Result<ResponseEnvelope, ProxyError>> {
        match self.client.build_request(method, url, body, headers) {
            Ok(request) => self.send(request),
            Err(error) => future::ready(Err(error)).boxed(),
        }
    }

    /// `GET` with no body. Relative targets resolve against the proxy.
    pub fn fetch(&self, url: &str) -> BoxFuture<'static, Result<ResponseEnvelope, ProxyError>> {
        let url = self.client.url_builder().resolve(url);
        self.dispatch::<()>(Method::Get, &url, None, None)
    }

    /// Send an already prepared request through the pipeline.
    pub fn send(
        &self,
        request: RequestSpec,
    ) -> BoxFuture<'static, Result<ResponseEnvelope, ProxyError>> {
        let this = self.clone();
        async move {
            tracing::debug!(method = %request.method, url = %request.url, "dispatching request");
            let response = this.transport.execute(request).await?;
            tracing::debug!(status = response.status, "response received");
            let parts = this.client.process_response(response)?;
            Ok(this.bind(parts))
        }
        .boxed()
    }

    fn bind(&self, parts: ResponseParts) -> ResponseEnvelope {
        let dispatcher = self.clone();
        let fetch: FetchFn = Arc::new(move |url: String| dispatcher.fetch(&url));
        let links = parts
            .links
            .into_iter()
            .map(|descriptor| Link::new(descriptor, Arc::clone(&fetch)))
            .collect();
        ResponseEnvelope {
            status: parts.status,
            headers: parts.headers,
            body: parts.body,
            links,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::config::ConfigOptions;
    use crate::http::{RawHeaders, TransportProfile, TransportResponse};

    /// Replays canned responses in order and records every request.
    struct ScriptedTransport {
        profile: TransportProfile,
        responses: Mutex<Vec<Result<TransportResponse, ProxyError>>>,
        requests: Mutex<Vec<RequestSpec>>,
    }

    impl ScriptedTransport {
        fn new(
            profile: TransportProfile,
            mut responses: Vec<Result<TransportResponse, ProxyError>>,
        ) -> Arc<Self> {
            responses.reverse();
            Arc::new(Self {
                profile,
                responses: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<RequestSpec> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Transport for ScriptedTransport {
        fn profile(&self) -> TransportProfile {
            self.profile
        }

        fn execute(
            &self,
            request: RequestSpec,
        ) -> BoxFuture<'static, Result<TransportResponse, ProxyError>> {
            self.requests.lock().unwrap().push(request);
            let next = self
                .responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(ProxyError::Transport("script exhausted".to_string())));
            future::ready(next).boxed()
        }
    }

    fn ok(status: u16, headers: RawHeaders, body: &str) -> Result<TransportResponse, ProxyError> {
        Ok(TransportResponse {
            status,
            headers,
            body: body.to_string(),
        })
    }

    fn map(pairs: &[(&str, &str)]) -> RawHeaders {
        RawHeaders::Map(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    fn client() -> ProxyClient {
        ProxyClient::new(ConfigOptions {
            protocol: Some("http".to_string()),
            host: Some("proxy.local".to_string()),
            port: Some(8080),
            prefix: Some("/kv".to_string()),
            token: Some("abc".to_string()),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn dispatch_chains_validation_and_link_parsing() {
        let transport = ScriptedTransport::new(
            TransportProfile::native(),
            vec![ok(
                200,
                map(&[("Link", r#"</v0/items?offset=10>; rel="next""#)]),
                r#"{"count":1}"#,
            )],
        );
        let dispatcher = Dispatcher::new(client(), transport.clone());

        let envelope = dispatcher
            .dispatch::<()>(Method::Get, "http://proxy.local:8080/kv/v0/items", None, None)
            .await
            .unwrap();

        assert_eq!(envelope.status, 200);
        let value: serde_json::Value = envelope.json().unwrap();
        assert_eq!(value["count"], 1);
        assert_eq!(envelope.links.len(), 1);
        assert_eq!(envelope.link("next").unwrap().url, "/v0/items?offset=10");

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].headers["Authorization"], "Basic YWJjOg==");
        assert!(requests[0].headers.contains_key("User-Agent"));
        assert!(requests[0].body.is_none());
    }

    #[tokio::test]
    async fn following_a_link_issues_a_get_to_its_target() {
        let transport = ScriptedTransport::new(
            TransportProfile::native(),
            vec![
                ok(200, map(&[("Link", r#"<https://x/items?offset=10>; rel="next""#)]), "[]"),
                ok(200, map(&[]), "[1]"),
            ],
        );
        let dispatcher = Dispatcher::new(client(), transport.clone());
        let first = dispatcher
            .dispatch(Method::Post, "http://proxy.local:8080/kv/v0/items", Some(&[1, 2]), None)
            .await
            .unwrap();

        let second = first.link("next").unwrap().get().await.unwrap();
        assert_eq!(second.body, "[1]");
        assert!(second.links.is_empty());

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].body.as_deref(), Some("[1,2]"));
        assert_eq!(requests[1].method, Method::Get);
        assert_eq!(requests[1].url, "https://x/items?offset=10");
        assert!(requests[1].body.is_none());
    }

    #[tokio::test]
    async fn relative_link_targets_resolve_against_proxy() {
        let transport = ScriptedTransport::new(
            TransportProfile::native(),
            vec![
                ok(200, map(&[("Link", r#"</v0/items?offset=2>; rel="next""#)]), "[]"),
                ok(200, map(&[]), "[]"),
            ],
        );
        let dispatcher = Dispatcher::new(client(), transport.clone());
        let first = dispatcher.fetch("http://proxy.local:8080/kv/v0/items").await.unwrap();
        first.links[0].get().await.unwrap();

        assert_eq!(
            transport.requests()[1].url,
            "http://proxy.local:8080/kv/v0/items?offset=2"
        );
    }

    #[tokio::test]
    async fn text_headers_are_normalized_and_user_agent_suppressed() {
        let transport = ScriptedTransport::new(
            TransportProfile::browser(),
            vec![ok(
                200,
                RawHeaders::Text(
                    concat!(
                        "ETag: \"1\"\r\n",
                        "Link: <https://x/a>; rel=\"next\", <https://x/b>; rel=\"prev\"",
                    )
                    .to_string(),
                ),
                "{}",
            )],
        );
        let dispatcher = Dispatcher::new(client(), transport.clone());
        let envelope = dispatcher.fetch("https://x").await.unwrap();

        assert_eq!(envelope.header("etag"), Some("\"1\""));
        let rels: Vec<&str> = envelope.links.iter().map(|l| l.rel.as_str()).collect();
        assert_eq!(rels, ["next", "prev"]);
        assert!(!transport.requests()[0].headers.contains_key("User-Agent"));
    }

    #[tokio::test]
    async fn non_2xx_is_rejected_with_status_and_body() {
        let transport = ScriptedTransport::new(
            TransportProfile::native(),
            vec![ok(404, map(&[]), r#"{"message":"missing"}"#)],
        );
        let dispatcher = Dispatcher::new(client(), transport.clone());
        let err = dispatcher.fetch("https://x").await.unwrap_err();

        assert!(err.is_not_found());
        match err {
            ProxyError::HttpStatus { body, .. } => assert_eq!(body, r#"{"message":"missing"}"#),
            other => panic!("expected HttpStatus, got {other:?}"),
        }
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn transport_failure_is_not_retried() {
        let transport = ScriptedTransport::new(
            TransportProfile::native(),
            vec![Err(ProxyError::Transport("connection refused".to_string()))],
        );
        let dispatcher = Dispatcher::new(client(), transport.clone());
        let err = dispatcher.fetch("https://x").await.unwrap_err();

        assert!(matches!(err, ProxyError::Transport(_)));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn malformed_link_entries_do_not_fail_the_response() {
        let transport = ScriptedTransport::new(
            TransportProfile::native(),
            vec![ok(200, map(&[("Link", r#"broken, <https://x/ok>; rel="next""#)]), "{}")],
        );
        let dispatcher = Dispatcher::new(client(), transport);
        let envelope = dispatcher.fetch("https://x").await.unwrap();

        assert_eq!(envelope.links.len(), 1);
        assert_eq!(envelope.links[0].url, "https://x/ok");
    }
}
