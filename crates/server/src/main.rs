use anyhow::Context;
use deployment::Deployment;
use server::{DeploymentImpl, routes};
use tracing::info;
use tracing_subscriber::{EnvFilter, prelude::*};

const DEFAULT_LOG_FILTER: &str =
    "server=info,services=info,db=info,local_deployment=info,tower_http=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .init();

    let deployment = DeploymentImpl::new()
        .await
        .context("Failed to initialize deployment")?;

    let addr = deployment.config().bind_addr();
    let app = routes::router(deployment);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server running on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {}", e);
    }
    info!("Shutdown signal received");
}
