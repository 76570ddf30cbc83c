//! End-to-end pipeline tests against the live mock proxy.
//!
//! # Design
//! Starts the mock server on a random port behind a `/proxy` prefix, then
//! drives the dispatcher through two transports: `ReqwestTransport`, which
//! returns structured headers, and a ureq-backed transport that flattens
//! headers into one CRLF string the way a browser-style request object
//! does. Both must produce the same envelopes and traversable links.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use kvproxy_core::{
    ConfigOptions, Dispatcher, Headers, Method, ProxyClient, ProxyError, Query, RawHeaders,
    ReqwestTransport, RequestSpec, Transport, TransportProfile, TransportResponse,
};
use mock_server::ItemList;

const TOKEN: &str = "secret";
const PREFIX: &str = "/proxy";

/// Executes requests with ureq on the blocking pool and reports headers as
/// a single CRLF-joined string.
struct TextHeaderTransport {
    agent: ureq::Agent,
}

impl TextHeaderTransport {
    fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &Headers,
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

fn execute_blocking(
    agent: &ureq::Agent,
    req: RequestSpec,
) -> Result<TransportResponse, ProxyError> {
    let body = req.body.unwrap_or_default();
    let result = match req.method {
        Method::Get => with_headers(agent.get(&req.url), &req.headers).call(),
        Method::Head => with_headers(agent.head(&req.url), &req.headers).call(),
        Method::Delete => with_headers(agent.delete(&req.url), &req.headers).call(),
        Method::Post => with_headers(agent.post(&req.url), &req.headers).send(body.as_bytes()),
        Method::Put => with_headers(agent.put(&req.url), &req.headers).send(body.as_bytes()),
        Method::Patch => with_headers(agent.patch(&req.url), &req.headers).send(body.as_bytes()),
    };
    let mut response = result.map_err(|e| ProxyError::Transport(e.to_string()))?;

    let status = response.status().as_u16();
    let raw_headers: Vec<String> = response
        .headers()
        .iter()
        .filter_map(|(name, value)| Some(format!("{}: {}", name, value.to_str().ok()?)))
        .collect();
    let body = response.body_mut().read_to_string().unwrap_or_default();

    Ok(TransportResponse {
        status,
        headers: RawHeaders::Text(raw_headers.join("\r\n")),
        body,
    })
}

impl Transport for TextHeaderTransport {
    fn profile(&self) -> TransportProfile {
        TransportProfile::browser()
    }

    fn execute(
        &self,
        request: RequestSpec,
    ) -> BoxFuture<'static, Result<TransportResponse, ProxyError>> {
        let agent = self.agent.clone();
        async move {
            tokio::task::spawn_blocking(move || execute_blocking(&agent, request))
                .await
                .map_err(|e| ProxyError::Transport(e.to_string()))?
        }
        .boxed()
    }
}

fn start_mock_proxy() -> std::net::SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener, PREFIX, Some(TOKEN)).await
        })
        .unwrap();
    });
    addr
}

fn client(port: u16, token: Option<&str>) -> ProxyClient {
    ProxyClient::new(ConfigOptions {
        protocol: Some("http".to_string()),
        host: Some("127.0.0.1".to_string()),
        port: Some(port),
        prefix: Some(PREFIX.to_string()),
        token: token.map(str::to_string),
    })
    .unwrap()
}

async fn seed(dispatcher: &Dispatcher, collection: &str, keys: &[&str]) {
    for key in keys {
        let url = dispatcher.client().generate_api_url(&[collection, key], None);
        let created = dispatcher
            .dispatch(Method::Put, &url, Some(&serde_json::json!({ "name": key })), None)
            .await
            .unwrap();
        assert_eq!(created.status, 201);
    }
}

#[tokio::test]
async fn crud_and_pagination_over_reqwest() {
    let addr = start_mock_proxy();
    let dispatcher = Dispatcher::new(
        client(addr.port(), Some(TOKEN)),
        Arc::new(ReqwestTransport::new()),
    );

    // Step 1: store three items; keys with reserved characters survive.
    seed(&dispatcher, "users", &["alice", "bob smith", "carol/c"]).await;

    // Step 2: read one back.
    let url = dispatcher.client().generate_api_url(&["users", "bob smith"], None);
    assert!(url.ends_with("/proxy/v0/users/bob%20smith"));
    let item = dispatcher.fetch(&url).await.unwrap();
    let value: serde_json::Value = item.json().unwrap();
    assert_eq!(value["name"], "bob smith");

    // Step 3: first page advertises the next one.
    let query = Query::new().param("limit", 2).opt_param("offset", None::<u32>);
    let url = dispatcher.client().generate_api_url(&["users"], Some(&query));
    let first = dispatcher.fetch(&url).await.unwrap();
    let page: ItemList = first.json().unwrap();
    assert_eq!(page.count, 2);
    assert_eq!(first.links.len(), 1);
    let next = first.link("next").unwrap();
    assert_eq!(next.url, "/v0/users?limit=2&offset=2");

    // Step 4: following it reaches the last page, which points back.
    let second = next.get().await.unwrap();
    let page: ItemList = second.json().unwrap();
    assert_eq!(page.count, 1);
    assert_eq!(page.results[0].key, "carol/c");
    assert!(second.link("next").is_none());
    assert_eq!(second.link("prev").unwrap().url, "/v0/users?limit=2&offset=0");

    // Step 5: delete, then the item is gone.
    let url = dispatcher.client().generate_api_url(&["users", "alice"], None);
    let deleted = dispatcher.dispatch::<()>(Method::Delete, &url, None, None).await.unwrap();
    assert_eq!(deleted.status, 204);
    let err = dispatcher.fetch(&url).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn anonymous_client_is_rejected_by_authenticating_proxy() {
    let addr = start_mock_proxy();
    let dispatcher = Dispatcher::new(client(addr.port(), None), Arc::new(ReqwestTransport::new()));
    let url = dispatcher.client().generate_api_url(&["users"], None);

    let err = dispatcher.fetch(&url).await.unwrap_err();
    match err {
        ProxyError::HttpStatus { status, body } => {
            assert_eq!(status, 401);
            assert!(body.contains("credentials"));
        }
        other => panic!("expected HttpStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn string_header_transport_parses_links() {
    let addr = start_mock_proxy();
    let dispatcher = Dispatcher::new(
        client(addr.port(), Some(TOKEN)),
        Arc::new(TextHeaderTransport::new()),
    );
    seed(&dispatcher, "items", &["a", "b", "c"]).await;

    let query = Query::new().param("limit", 1).param("offset", 1);
    let url = dispatcher.client().generate_api_url(&["items"], Some(&query));
    let middle = dispatcher.fetch(&url).await.unwrap();

    assert_eq!(middle.header("Content-Type"), Some("application/json"));
    let rels: Vec<&str> = middle.links.iter().map(|l| l.rel.as_str()).collect();
    assert_eq!(rels, ["next", "prev"]);

    let last = middle.link("next").unwrap().get().await.unwrap();
    let page: ItemList = last.json().unwrap();
    assert_eq!(page.results[0].key, "c");
}

#[tokio::test]
async fn unreachable_proxy_is_a_transport_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let dispatcher = Dispatcher::new(client(port, Some(TOKEN)), Arc::new(ReqwestTransport::new()));
    let url = dispatcher.client().generate_api_url(&["users"], None);

    let err = dispatcher.fetch(&url).await.unwrap_err();
    assert!(matches!(err, ProxyError::Transport(_)));
}

/// Serves one canned HTTP/1.1 response, then closes the connection.
async fn serve_once(raw_response: &'static str) -> std::net::SocketAddr {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        socket.write_all(raw_response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
    });
    addr
}

#[tokio::test]
async fn repeated_link_fields_all_become_links() {
    let addr = serve_once(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: application/json\r\n\
         Link: <https://x/a>; rel=\"next\"\r\n\
         Link: <https://x/b>; rel=\"prev\"\r\n\
         Content-Length: 2\r\n\
         Connection: close\r\n\
         \r\n\
         []",
    )
    .await;
    let dispatcher = Dispatcher::new(
        client(addr.port(), Some(TOKEN)),
        Arc::new(ReqwestTransport::new()),
    );
    let url = dispatcher.client().generate_api_url(&["items"], None);

    let response = dispatcher.fetch(&url).await.unwrap();
    let rels: Vec<&str> = response.links.iter().map(|l| l.rel.as_str()).collect();
    assert_eq!(rels, ["next", "prev"]);
    assert_eq!(response.link("next").unwrap().url, "https://x/a");
}
