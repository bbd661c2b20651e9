//! Messages exchanged inside the host process.

use courier_bus::{Message, MessageHeader};
use serde::{Deserialize, Serialize};

/// Liveness tick sent through the queue at a fixed interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Heartbeat {
    header: MessageHeader,
    pub sequence: u64,
}

impl Heartbeat {
    pub fn new(sequence: u64) -> Self {
        Self {
            header: MessageHeader::new(),
            sequence,
        }
    }
}

impl Message for Heartbeat {
    fn header(&self) -> &MessageHeader {
        &self.header
    }
}

/// Something an operator or component did that must be recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    header: MessageHeader,
    pub actor: String,
    pub action: String,
}

impl AuditRecord {
    pub fn new(actor: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            header: MessageHeader::new(),
            actor: actor.into(),
            action: action.into(),
        }
    }
}

impl Message for AuditRecord {
    fn header(&self) -> &MessageHeader {
        &self.header
    }
}

/// A runtime setting changed. Nobody subscribes to this; it is served by
/// the handler catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigChanged {
    header: MessageHeader,
    pub key: String,
    pub value: String,
}

impl ConfigChanged {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            header: MessageHeader::new(),
            key: key.into(),
            value: value.into(),
        }
    }
}

impl Message for ConfigChanged {
    fn header(&self) -> &MessageHeader {
        &self.header
    }
}
