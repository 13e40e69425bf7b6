use std::sync::Arc;

use mock_server::MockKernel;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "6806".to_string());
    let kernel = match std::env::var("SIYUAN_TOKEN") {
        Ok(token) if !token.is_empty() => MockKernel::new().with_token(&token),
        _ => MockKernel::new(),
    };
    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "mock kernel listening");
    mock_server::run_with(listener, Arc::new(kernel)).await
}
