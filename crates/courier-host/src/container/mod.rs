//! # Host Container
//!
//! Configuration for everything the composition root builds.

pub mod config;

pub use config::{ConfigError, HostConfig};
