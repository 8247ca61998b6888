//! # Edge Overlay Node
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (`EO_CONFIG` file, then `EO_*` environment)
//! 2. Install logging
//! 3. Build the proxy and the pool over the P2P collaborators
//! 4. Start the pool loop and the proxy listener
//! 5. Run until Ctrl+C, then shut down

use anyhow::{Context, Result};
use node_runtime::logging::init_logging;
use node_runtime::{NodeConfig, NodeRuntime};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = NodeConfig::load().context("failed to load configuration")?;
    init_logging(&config.logging)?;

    let mut node = NodeRuntime::new(config)?;
    let addr = node.start().await?;
    info!(addr = %addr, peer_id = %node.local_peer(), "node is running, press Ctrl+C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;

    node.shutdown().await;
    Ok(())
}
