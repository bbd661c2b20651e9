//! # Heartbeat Monitor
//!
//! Tracks the heartbeats the host sends to itself through the queue. A gap
//! in the sequence means a heartbeat was abandoned or delivered out of
//! order, which is logged as a warning.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use courier_bus::{CancellationToken, HandlerResult, Message, MessageHandler};
use courier_telemetry::log_event;

use super::messages::Heartbeat;
use crate::COMPONENT;

/// Handler recording the last heartbeat seen.
#[derive(Debug, Default)]
pub struct HeartbeatMonitor {
    received: AtomicU64,
    last_sequence: AtomicU64,
}

impl HeartbeatMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Heartbeats handled so far.
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Sequence number of the latest heartbeat, 0 before the first.
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MessageHandler<Heartbeat> for HeartbeatMonitor {
    async fn handle(&self, message: &Heartbeat, _cancel: &CancellationToken) -> HandlerResult {
        let previous = self.last_sequence.swap(message.sequence, Ordering::Relaxed);
        self.received.fetch_add(1, Ordering::Relaxed);

        if previous != 0 && message.sequence != previous + 1 {
            log_event!(
                warn,
                COMPONENT,
                "Heartbeat sequence gap",
                expected = previous + 1,
                got = message.sequence
            );
        } else {
            log_event!(
                debug,
                COMPONENT,
                "Heartbeat received",
                sequence = message.sequence,
                message_id = %message.id()
            );
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "heartbeat-monitor"
    }
}
