//! Bounded in-memory audit trail.

use std::collections::VecDeque;

use async_trait::async_trait;
use courier_bus::{CancellationToken, HandlerError, HandlerResult, Message, MessageHandler};
use courier_telemetry::log_event;
use parking_lot::Mutex;

use super::messages::AuditRecord;
use crate::COMPONENT;

/// Keeps the newest `capacity` audit records. A capacity of zero keeps none.
pub struct AuditTrail {
    capacity: usize,
    records: Mutex<VecDeque<AuditRecord>>,
}

impl AuditTrail {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            records: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Copy of the retained records, oldest first.
    pub fn snapshot(&self) -> Vec<AuditRecord> {
        self.records.lock().iter().cloned().collect()
    }
}

#[async_trait]
impl MessageHandler<AuditRecord> for AuditTrail {
    async fn handle(&self, message: &AuditRecord, _cancel: &CancellationToken) -> HandlerResult {
        if message.actor.trim().is_empty() {
            return Err(HandlerError::failed("audit record without actor"));
        }

        if self.capacity > 0 {
            let mut records = self.records.lock();
            while records.len() >= self.capacity {
                records.pop_front();
            }
            records.push_back(message.clone());
        }

        log_event!(
            info,
            COMPONENT,
            "Audit record stored",
            actor = %message.actor,
            action = %message.action,
            message_id = %message.id()
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "audit-trail"
    }
}
