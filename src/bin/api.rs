use broker_tool_gateway::{agent::Orchestrator, api::start_server, config::GatewayConfig};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = GatewayConfig::from_env().map_err(|e| {
        error!("Failed to start: {}", e);
        e
    })?;

    info!("🚀 Broker Tool Gateway - API Server");
    info!("📍 Port: {}", config.api_port);
    info!(
        "⚙️  Dry run: {} | Max order quantity: {}",
        config.trading.dry_run, config.trading.max_order_quantity
    );

    let orchestrator = Arc::new(Orchestrator::from_config(&config)?);

    info!("✅ Orchestrator initialized");
    info!("📡 Starting API server...");

    start_server(orchestrator, config.api_port).await?;

    Ok(())
}
