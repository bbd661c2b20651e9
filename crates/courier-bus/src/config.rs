//! Queue and lifecycle configuration.

use std::env;
use std::time::Duration;

/// Tuning for the queued dispatch path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// How long an idle consumer waits before re-checking its FIFO.
    pub poll_interval: Duration,

    /// Pause after a forwarding failure before the next message.
    pub failure_cooldown: Duration,

    /// Upper bound `dispose` waits for consumers to exit.
    pub dispose_timeout: Duration,

    /// Start the queue (Running) as soon as it is constructed.
    pub auto_start: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(QueueConfig::DEFAULT_POLL_MS),
            failure_cooldown: Duration::from_millis(QueueConfig::DEFAULT_COOLDOWN_MS),
            dispose_timeout: Duration::from_millis(QueueConfig::DEFAULT_DISPOSE_TIMEOUT_MS),
            auto_start: true,
        }
    }
}

impl QueueConfig {
    pub const DEFAULT_POLL_MS: u64 = 100;
    pub const DEFAULT_COOLDOWN_MS: u64 = 100;
    pub const DEFAULT_DISPOSE_TIMEOUT_MS: u64 = 5_000;

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `COURIER_QUEUE_POLL_MS`: idle polling interval (default: 100)
    /// - `COURIER_QUEUE_COOLDOWN_MS`: cooldown after a failure (default: 100)
    /// - `COURIER_DISPOSE_TIMEOUT_MS`: bounded wait on dispose (default: 5000)
    /// - `COURIER_QUEUE_AUTO_START`: start on construction (default: true)
    pub fn from_env() -> Self {
        Self {
            poll_interval: Duration::from_millis(millis_var(
                "COURIER_QUEUE_POLL_MS",
                Self::DEFAULT_POLL_MS,
            )),
            failure_cooldown: Duration::from_millis(millis_var(
                "COURIER_QUEUE_COOLDOWN_MS",
                Self::DEFAULT_COOLDOWN_MS,
            )),
            dispose_timeout: Duration::from_millis(millis_var(
                "COURIER_DISPOSE_TIMEOUT_MS",
                Self::DEFAULT_DISPOSE_TIMEOUT_MS,
            )),
            auto_start: env::var("COURIER_QUEUE_AUTO_START")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(true),
        }
    }

    /// Same configuration with a different polling interval.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Same configuration with `auto_start` set.
    #[must_use]
    pub fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }
}

fn millis_var(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
