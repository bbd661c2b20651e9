//! Global `tracing` subscriber setup.
//!
//! Installs an `EnvFilter` plus either a pretty or a JSON fmt layer. The
//! bus crates only emit events; this is the one place a subscriber is
//! chosen.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{TelemetryConfig, TelemetryError};

/// Marker returned once the global subscriber is installed.
#[derive(Debug)]
pub struct TracingGuard {
    service_name: String,
}

impl TracingGuard {
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

/// Build the filter from `config.log_level`.
///
/// `TelemetryConfig::from_env` has already applied the
/// `COURIER_LOG_LEVEL` over `RUST_LOG` precedence; the process environment
/// is not read again here.
pub fn env_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(&config.log_level)
        .map_err(|e| TelemetryError::Config(format!("invalid log filter: {e}")))
}

/// Install the global subscriber.
///
/// Fails with `TelemetryError::TracerInit` if a global subscriber is
/// already set.
pub fn init_tracing(config: &TelemetryConfig) -> Result<TracingGuard, TelemetryError> {
    let env_filter = env_filter(config)?;

    if !config.console_output {
        tracing_subscriber::registry()
            .with(env_filter)
            .try_init()
            .map_err(|e| TelemetryError::TracerInit(e.to_string()))?;
    } else if config.json_logs {
        // JSON output for containers/production
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .try_init()
            .map_err(|e| TelemetryError::TracerInit(e.to_string()))?;
    } else {
        // Pretty output for development
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_ansi(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::TracerInit(e.to_string()))?;
    }

    tracing::info!(
        service = %config.service_name,
        json = config.json_logs,
        filter = %config.log_level,
        "Tracing initialized"
    );

    Ok(TracingGuard {
        service_name: config.service_name.clone(),
    })
}
