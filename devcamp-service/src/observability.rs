//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

use crate::config::{Config, Environment};
use crate::error::{Error, Result};

/// Initialize tracing for the configured environment
///
/// Production logs are JSON lines; development logs use the compact human
/// format. `service.log_level` is an `EnvFilter` directive and falls back to
/// `info` when it doesn't parse. `RUST_LOG` is not consulted.
///
/// # Errors
///
/// Returns [`Error::Internal`] if a global subscriber is already installed.
pub fn init_tracing(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = match config.service.environment {
        Environment::Production => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init(),
        Environment::Development => tracing_subscriber::fmt()
            .compact()
            .with_env_filter(filter)
            .try_init(),
    };
    installed.map_err(|e| Error::Internal(format!("failed to install tracing subscriber: {e}")))?;

    tracing::info!(
        environment = %config.service.environment,
        "Tracing initialized for service: {}",
        config.service.name
    );

    Ok(())
}

/// Shutdown tracing
pub fn shutdown_tracing() {
    tracing::info!("Tracing shutdown complete");
}
