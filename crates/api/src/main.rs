use std::sync::Arc;

use anyhow::Context;

use terminal_infra::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    terminal_observability::init();

    let config = AppConfig::from_env();
    let bind_addr = config.bind_addr.clone();

    let services = terminal_api::app::services::build_services(config)
        .await
        .context("failed to wire services")?;
    let app = terminal_api::app::build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
