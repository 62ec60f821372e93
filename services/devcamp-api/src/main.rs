//! devcamp API service
//!
//! Serves the bootcamp and course endpoints on `service.port`.

use anyhow::Context;
use devcamp_service::observability::shutdown_tracing;
use devcamp_service::prelude::*;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration; a missing or invalid environment mode stops here
    let config = Config::load().context("failed to load configuration")?;

    // Initialize tracing
    init_tracing(&config)?;

    info!(
        environment = %config.service.environment,
        "Starting devcamp API service"
    );

    // Build application state and routes
    let state = AppState::new(config.clone());
    let app = build_router(state);

    // Run server
    Server::new(config).serve(app).await?;

    shutdown_tracing();

    Ok(())
}
