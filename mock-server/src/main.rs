use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let prefix = std::env::var("MOCK_PREFIX").unwrap_or_default();
    let token = std::env::var("MOCK_PROXY_TOKEN").ok();
    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, prefix = %prefix, auth = token.is_some(), "mock proxy listening");
    mock_server::run(listener, &prefix, token.as_deref()).await
}
