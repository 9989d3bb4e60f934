use mock_server::MockConfig;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("127.0.0.1:{port}");
    let public_url = std::env::var("MOCK_PUBLIC_URL").unwrap_or_else(|_| format!("http://{addr}"));

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, %public_url, "mock platform listening");
    mock_server::run(listener, MockConfig::new(public_url)).await
}
