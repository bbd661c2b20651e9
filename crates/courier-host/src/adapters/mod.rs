//! # Adapters
//!
//! Glue between the bus and the host's ambient stack.

pub mod metrics;

pub use metrics::MetricsBehavior;
