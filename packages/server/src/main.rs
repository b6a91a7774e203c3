use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use server_core::ingest::maintenance;
use server_core::server::create_app;
use server_core::{Deps, Settings};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::from_env()?;
    let port = settings.port;

    let deps = Deps::connect(settings).await?;

    let _scheduler = maintenance::start_scheduler(deps.clone()).await?;

    let app = create_app(deps);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
