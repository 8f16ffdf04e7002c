use std::net::SocketAddr;

use anyhow::Context;

use warden_infra::WardenConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    warden_observability::init();

    let config = WardenConfig::from_env().context("loading configuration")?;
    tracing::info!(?config, "configuration loaded");

    let state = warden_api::app::build_state(&config).await?;
    let app = warden_api::app::build_app(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("server error")
}
