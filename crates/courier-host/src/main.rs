//! # Courier Host
//!
//! Runs a message bus until ctrl-c.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration from the environment
//! 2. Initialize telemetry (logs + Prometheus metrics)
//! 3. Validate configuration
//! 4. Wire the bus and its handlers
//! 5. Start queued delivery and the heartbeat
//!
//! ## Shutdown Sequence
//!
//! 1. Stop the heartbeat
//! 2. Dispose the bus
//! 3. Dump the final metrics at debug level

use anyhow::{Context, Result};
use courier_host::handlers::AuditRecord;
use courier_host::{HostConfig, HostRuntime};
use courier_telemetry::init_telemetry;
use tracing::{debug, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = HostConfig::from_env();

    let telemetry = init_telemetry(config.telemetry.clone()).context("Failed to init telemetry")?;

    config.validate().context("Invalid configuration")?;

    let runtime = HostRuntime::new(config).context("Failed to wire message bus")?;
    runtime.start().context("Failed to start message bus")?;

    runtime
        .publish(&AuditRecord::new("courier-host", "startup"))
        .await
        .context("Failed to record startup")?;

    info!("Host is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown().await;

    if let Some(metrics) = telemetry.metrics() {
        match metrics.gather() {
            Ok(text) => debug!(metrics = %text, "Final metrics"),
            Err(e) => debug!(error = %e, "Failed to gather metrics"),
        }
    }

    Ok(())
}
