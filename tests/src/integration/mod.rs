//! Cross-crate integration tests for the message bus.

pub mod fan_out;
pub mod lifecycle;
pub mod pipelines;
pub mod queueing;
