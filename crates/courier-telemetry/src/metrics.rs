//! Prometheus metrics for bus traffic.
//!
//! All metrics follow the naming convention: `courier_bus_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: published and enqueued messages
//! - **CounterVec**: handler failures by message type
//! - **HistogramVec**: handler duration by message type
//! - **Gauge**: messages waiting in queues

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Encoder, Gauge, HistogramOpts, HistogramVec, IntCounter, IntCounterVec,
    Opts, Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// Messages delivered through the direct (fan-out) path
    pub static ref MESSAGES_PUBLISHED: IntCounter = IntCounter::new(
        "courier_bus_messages_published_total",
        "Total messages published through direct fan-out"
    ).expect("metric creation failed");

    /// Messages accepted by the queued path
    pub static ref MESSAGES_ENQUEUED: IntCounter = IntCounter::new(
        "courier_bus_messages_enqueued_total",
        "Total messages accepted by per-type queues"
    ).expect("metric creation failed");

    /// Handler failures, including panics
    pub static ref HANDLER_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("courier_bus_handler_failures_total", "Handler invocations that failed"),
        &["message_type"]
    ).expect("metric creation failed");

    /// Handler duration histogram
    pub static ref HANDLER_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "courier_bus_handler_duration_seconds",
            "Time spent inside a handler invocation"
        ).buckets(exponential_buckets(0.0001, 2.0, 16).expect("valid buckets")),
        &["message_type"]
    ).expect("metric creation failed");

    /// Messages waiting across all queues
    pub static ref QUEUE_DEPTH: Gauge = Gauge::new(
        "courier_bus_queue_depth",
        "Messages waiting in per-type queues"
    ).expect("metric creation failed");
}

/// Handle to the registry the bus metrics live in.
#[derive(Clone)]
pub struct MetricsHandle {
    registry: Registry,
}

impl MetricsHandle {
    /// Render every registered metric in Prometheus text format.
    pub fn gather(&self) -> Result<String, TelemetryError> {
        encode(&self.registry)
    }
}

/// Register all bus metrics with the global registry.
///
/// Safe to call more than once; metrics already registered are kept.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(MESSAGES_PUBLISHED.clone()),
        Box::new(MESSAGES_ENQUEUED.clone()),
        Box::new(HANDLER_FAILURES.clone()),
        Box::new(HANDLER_DURATION.clone()),
        Box::new(QUEUE_DEPTH.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        registry: REGISTRY.clone(),
    })
}

fn encode(registry: &Registry) -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Record one handler invocation.
pub fn observe_handler(message_type: &str, elapsed_secs: f64, failed: bool) {
    HANDLER_DURATION
        .with_label_values(&[message_type])
        .observe(elapsed_secs);
    if failed {
        HANDLER_FAILURES.with_label_values(&[message_type]).inc();
    }
}
