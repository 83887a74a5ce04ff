use std::sync::Arc;

use anyhow::Context;

use scribe_api::app::{build_app, services::build_services};
use scribe_infra::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    scribe_observability::init();

    let settings = Settings::from_env().context("failed to load settings")?;
    let services = Arc::new(build_services(&settings).await?);
    let app = build_app(services);

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
