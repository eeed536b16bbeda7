use std::net::SocketAddr;

use anyhow::Context;

use eventhub_api::{ApiConfig, Services, build_app};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    eventhub_observability::init();

    let config = ApiConfig::from_env()?;
    let app = build_app(&config, Services::in_memory())?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server error")?;

    Ok(())
}
