//! # Messages
//!
//! Every message routed through the bus carries a `MessageHeader`: a v4 UUID
//! and the UTC instant it was created. Both are assigned once, at
//! construction, and cannot be changed afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::any::TypeId;
use std::fmt;
use uuid::Uuid;

/// Identity shared by all messages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageHeader {
    id: Uuid,
    created_at: DateTime<Utc>,
}

impl MessageHeader {
    /// Create a header with a fresh identifier and the current timestamp.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }

    /// Unique identifier of the message.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// When the message was constructed.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Default for MessageHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// A value that can be routed through the bus.
///
/// Implementors embed a `MessageHeader` and expose it; identity and
/// timestamp accessors are provided on top of it.
///
/// ```rust,ignore
/// #[derive(Debug, Clone)]
/// struct Ping { header: MessageHeader, seq: u64 }
///
/// impl Message for Ping {
///     fn header(&self) -> &MessageHeader { &self.header }
/// }
/// ```
pub trait Message: Send + Sync + 'static {
    /// The identity header assigned at construction.
    fn header(&self) -> &MessageHeader;

    /// Unique identifier of this message.
    fn id(&self) -> Uuid {
        self.header().id()
    }

    /// Creation timestamp (UTC).
    fn created_at(&self) -> DateTime<Utc> {
        self.header().created_at()
    }

    /// Type name used in logs.
    fn message_type(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Dispatch key for a message type.
///
/// Equality and hashing use the `TypeId` only; the name is carried for logs.
#[derive(Clone, Copy)]
pub struct MessageType {
    type_id: TypeId,
    name: &'static str,
}

impl MessageType {
    /// Key for the message type `M`.
    #[must_use]
    pub fn of<M: Message>() -> Self {
        Self {
            type_id: TypeId::of::<M>(),
            name: std::any::type_name::<M>(),
        }
    }

    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Fully-qualified type name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Last path segment of the type name (`Ping` rather than `my_app::events::Ping`).
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        self.name.rsplit("::").next().unwrap_or(self.name)
    }
}

impl PartialEq for MessageType {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for MessageType {}

impl std::hash::Hash for MessageType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}
