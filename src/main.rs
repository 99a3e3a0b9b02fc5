//! Login service binary.
//!
//! Reads settings from the environment (see `ServerConfig::from_env`),
//! seeds the configured identity providers and serves the login endpoints.

use anyhow::Context;
use core_runtime::config::ServerConfig;
use core_runtime::logging::{init_logging, LoggingConfig};
use core_service::{bootstrap_server, spawn_event_log};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env().context("invalid configuration")?;

    let mut logging = LoggingConfig::default().with_format(config.log_format);
    if let Some(filter) = &config.log_filter {
        logging = logging.with_filter(filter.clone());
    }
    init_logging(logging).context("failed to initialize logging")?;

    info!(
        bind = %config.bind_address,
        providers = config.providers.len(),
        "Starting login service"
    );

    let service = bootstrap_server(&config)
        .await
        .context("failed to start login service")?;
    let _event_log = spawn_event_log(service.event_bus());

    let listener = TcpListener::bind(config.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address))?;

    service.serve(listener).await?;
    Ok(())
}
