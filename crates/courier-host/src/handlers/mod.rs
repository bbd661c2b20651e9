//! # Host Handlers
//!
//! The messages this host exchanges and the handlers subscribed to them.

pub mod audit;
pub mod config_change;
pub mod heartbeat;
pub mod messages;

pub use audit::AuditTrail;
pub use config_change::ConfigChangeLogger;
pub use heartbeat::HeartbeatMonitor;
pub use messages::{AuditRecord, ConfigChanged, Heartbeat};
