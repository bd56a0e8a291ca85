//! Interactive OMM provider over TCP.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use omm_server::config::Config;
use omm_server::server;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    info!(
        "Starting omm-server on {}:{} (service {} '{}', max_clients = {})",
        config.bind_addr,
        config.port,
        config.service_id,
        config.service_name,
        config.max_clients
    );

    server::run(config).await
}
