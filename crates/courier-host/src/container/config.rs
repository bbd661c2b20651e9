//! # Host Configuration
//!
//! Unified configuration for the bus and the host's own runtime parameters.
//!
//! ## Requirements
//!
//! - Every interval must be non-zero; a zero poll interval would spin the
//!   consumer loops
//! - All values have sane defaults with environment overrides

use std::env;
use std::time::Duration;

use courier_bus::QueueConfig;
use courier_telemetry::TelemetryConfig;
use thiserror::Error;

/// Complete host configuration.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Queued-dispatch configuration handed to the bus.
    pub queue: QueueConfig,
    /// Logging and metrics configuration.
    pub telemetry: TelemetryConfig,
    /// Interval between heartbeats sent through the queue.
    pub heartbeat_interval: Duration,
    /// Capacity of the in-memory audit trail.
    pub audit_capacity: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            queue: QueueConfig::default(),
            telemetry: TelemetryConfig::default(),
            heartbeat_interval: Duration::from_secs(5),
            audit_capacity: 1024,
        }
    }
}

impl HostConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - everything read by `QueueConfig::from_env` and `TelemetryConfig::from_env`
    /// - `COURIER_HEARTBEAT_MS`: heartbeat interval (default: 5000)
    /// - `COURIER_AUDIT_CAPACITY`: audit records kept in memory (default: 1024)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            queue: QueueConfig::from_env(),
            telemetry: TelemetryConfig::for_service("courier-host"),
            heartbeat_interval: env::var("COURIER_HEARTBEAT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.heartbeat_interval),
            audit_capacity: env::var("COURIER_AUDIT_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.audit_capacity),
        }
    }

    /// Reject configurations the runtime cannot run with.
    ///
    /// # Errors
    ///
    /// `ConfigError` naming the first offending setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue.poll_interval.is_zero() {
            return Err(ConfigError::ZeroInterval("COURIER_QUEUE_POLL_MS"));
        }
        if self.queue.dispose_timeout.is_zero() {
            return Err(ConfigError::ZeroInterval("COURIER_DISPOSE_TIMEOUT_MS"));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(ConfigError::ZeroInterval("COURIER_HEARTBEAT_MS"));
        }
        if self.audit_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// An interval that must be positive was zero.
    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),

    /// The audit trail would keep nothing.
    #[error("COURIER_AUDIT_CAPACITY must be greater than zero")]
    ZeroCapacity,
}
