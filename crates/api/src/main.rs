use anyhow::Context;

use docvault_api::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    docvault_observability::init();

    let config = ApiConfig::from_env().context("invalid configuration")?;
    let app = docvault_api::app::build_app(&config).await?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %config.bind_addr, mode = ?config.validator.mode, "listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
