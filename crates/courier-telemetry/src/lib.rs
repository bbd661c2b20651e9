//! # Courier Telemetry
//!
//! Logging and metrics for processes hosting a courier bus.
//!
//! ## Components
//!
//! - **Logs**: `tracing-subscriber` with an `EnvFilter` and a pretty or
//!   JSON fmt layer
//! - **Metrics**: Prometheus counters and histograms for bus traffic
//!
//! ## Usage
//!
//! ```rust,ignore
//! use courier_telemetry::{TelemetryConfig, init_telemetry};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = TelemetryConfig::from_env();
//!     let _guard = init_telemetry(config).expect("Failed to init telemetry");
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OTEL_SERVICE_NAME` | `courier` | Service name in logs |
//! | `COURIER_LOG_LEVEL` | `info` | Log filter, wins over `RUST_LOG` |
//! | `COURIER_JSON_LOGS` | `false` | JSON output (`true` in containers) |
//! | `COURIER_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `COURIER_METRICS` | `true` | Register Prometheus metrics |

mod config;
mod logging;
pub mod metrics;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use metrics::{
    observe_handler, register_metrics, MetricsHandle, HANDLER_DURATION, HANDLER_FAILURES,
    MESSAGES_ENQUEUED, MESSAGES_PUBLISHED, QUEUE_DEPTH,
};
pub use tracing_setup::{env_filter, TracingGuard};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracerInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Install the global subscriber and register bus metrics.
///
/// Returns a guard that should be held for the lifetime of the process.
///
/// # Errors
///
/// Fails if the log filter is invalid, a global subscriber is already set
/// or a metric cannot be registered.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics = if config.metrics_enabled {
        Some(register_metrics()?)
    } else {
        None
    };

    let tracing = tracing_setup::init_tracing(&config)?;

    Ok(TelemetryGuard { tracing, metrics })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    tracing: TracingGuard,
    metrics: Option<MetricsHandle>,
}

impl TelemetryGuard {
    /// Metrics handle, if metrics were enabled.
    #[must_use]
    pub fn metrics(&self) -> Option<&MetricsHandle> {
        self.metrics.as_ref()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.tracing.service_name(), "Shutting down telemetry...");
    }
}
