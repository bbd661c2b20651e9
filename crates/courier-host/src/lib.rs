//! # Courier Host Library
//!
//! Composition root for a process embedding the courier bus. The binary in
//! `main.rs` is a thin shell around [`HostRuntime`].
//!
//! ## Layout
//!
//! - `container/` - configuration loaded from the environment
//! - `handlers/` - the host's messages and the handlers subscribed to them
//! - `adapters/` - glue to the ambient stack (Prometheus behavior)
//! - `wiring/` - builds the single shared bus and owns its lifecycle

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod container;
pub mod handlers;
pub mod wiring;

pub use container::{ConfigError, HostConfig};
pub use wiring::HostRuntime;

/// Component name used in structured logs.
pub const COMPONENT: &str = "courier-host";
