//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for logging and metrics.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to every log line
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error) or a full
    /// `EnvFilter` directive such as `courier_bus=debug,info`
    pub log_level: String,

    /// Whether to write logs to stdout at all
    pub console_output: bool,

    /// Whether to emit JSON formatted logs
    pub json_logs: bool,

    /// Whether to register the bus metrics with the Prometheus registry
    pub metrics_enabled: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "courier".to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
            metrics_enabled: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OTEL_SERVICE_NAME`: Service name (default: courier)
    /// - `COURIER_LOG_LEVEL` or `RUST_LOG`: Log filter (default: info)
    /// - `COURIER_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `COURIER_JSON_LOGS`: Enable JSON logs (default: false in dev, true in containers)
    /// - `COURIER_METRICS`: Register Prometheus metrics (default: true)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "courier".to_string()),

            log_level: env::var("COURIER_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            console_output: env::var("COURIER_CONSOLE_OUTPUT")
                .map(|v| flag(&v, true))
                .unwrap_or(true),

            json_logs: env::var("COURIER_JSON_LOGS")
                .map(|v| flag(&v, false))
                .unwrap_or(is_container),

            metrics_enabled: env::var("COURIER_METRICS")
                .map(|v| flag(&v, true))
                .unwrap_or(true),
        }
    }

    /// Configuration for a named service, everything else from the environment.
    pub fn for_service(service_name: &str) -> Self {
        let mut config = Self::from_env();
        config.service_name = service_name.to_string();
        config
    }
}

/// Parse a boolean flag; anything unrecognised keeps `default`.
fn flag(value: &str, default: bool) -> bool {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => true,
        "false" | "0" | "no" | "off" => false,
        _ => default,
    }
}
