//! Assets gateway - main entry point.

use anyhow::Result;
use gateway_common::config::Config;
use gateway_common::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    tracing::info!("Assets gateway v{}", env!("CARGO_PKG_VERSION"));

    // Start the gateway server
    assets_gateway::start_server(&config).await
}
