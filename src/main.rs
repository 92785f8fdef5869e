// Main entry point - Configuration, logging and gateway lifecycle
mod application;
mod domain;
mod gateway;
mod infrastructure;
mod presentation;

use std::{sync::Arc, time::Duration};
use tracing_subscriber::EnvFilter;

use crate::gateway::Gateway;
use crate::infrastructure::config::load_gateway_config;
use crate::infrastructure::http_fleet_client::HttpFleetClient;
use crate::infrastructure::simulated_robot::SimulatedRobot;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = load_gateway_config()?;

    // Create adapters (infrastructure layer)
    let controller = Arc::new(SimulatedRobot::new(&config.simulator));
    let fleet = Arc::new(HttpFleetClient::new(
        config.fleet.status_url(),
        Duration::from_secs(config.fleet.request_timeout_secs),
    )?);
    tracing::info!("Reporting status to {}", fleet.status_url());

    // Start the gateway
    let mut gateway = Gateway::start(&config, controller, fleet).await?;
    tracing::info!(
        "Robot gateway v{} listening on {}",
        env!("CARGO_PKG_VERSION"),
        gateway.local_addr()
    );

    tokio::signal::ctrl_c().await?;
    if let Some(aggregator) = gateway.aggregator() {
        tracing::info!("Shutdown requested, robot is {}", aggregator.current_status().status);
    }
    gateway.shutdown().await;

    Ok(())
}
