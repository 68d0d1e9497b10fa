use anyhow::Result;
use buckle::config::Config;
use buckle::config_validator::ConfigValidator;
use buckle::server::Server;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Flags and environment, after any .env file
    let config = Config::load();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("buckle={},tower_http=info", config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    ConfigValidator::validate(&config)
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    tracing::info!("Starting buckle badge server");
    tracing::info!(
        "Configuration: bind_address={}, memory_store={}, pypi_url={}, drone_url={}",
        config.bind_address(),
        config.uses_memory_store(),
        config.pypi_url,
        config.drone_url
    );

    Server::new(config)
        .run()
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
