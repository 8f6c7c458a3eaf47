//! Warren node binary
//!
//! Hooks into the mesh, then serves the join protocol to later joiners.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use warren_node::{NodeConfig, WarrenNode};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warren_node=info,warren=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Warren node");

    let config = NodeConfig::from_env();

    let node = WarrenNode::new(config).await?;
    node.run().await?;

    Ok(())
}
