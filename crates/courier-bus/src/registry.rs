//! # Handler Registry
//!
//! Type-keyed table of handlers shared by the direct and queued dispatch
//! paths.
//!
//! - Keyed by `TypeId`; each entry holds a homogeneous, ordered list of
//!   `Arc<dyn MessageHandler<M>>` for exactly one `M`.
//! - Registration is idempotent and removal is by `Arc` identity, never by
//!   value equality.
//! - `lookup` returns a snapshot taken under the entry lock, so handlers may
//!   (un)register while a fan-out iterates its copy.
//! - Mutations hold only the `DashMap` shard lock of their own type.

use crate::handler::MessageHandler;
use crate::message::{Message, MessageType};
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::sync::Arc;
use tracing::debug;

/// Shared handle to a handler for messages of type `M`.
pub type HandlerRef<M> = Arc<dyn MessageHandler<M>>;

/// One registered handler.
///
/// `key` is the identity the subscriber registered with; `invoker` is what
/// the dispatcher calls. They differ when the handler is wrapped in a
/// pipeline.
struct Registration<M: Message> {
    key: HandlerRef<M>,
    invoker: HandlerRef<M>,
}

struct Entry {
    message_type: MessageType,
    count: usize,
    /// `Vec<Registration<M>>` for the `M` this entry is keyed by.
    handlers: Box<dyn Any + Send + Sync>,
}

impl Entry {
    fn new<M: Message>() -> Self {
        Self {
            message_type: MessageType::of::<M>(),
            count: 0,
            handlers: Box::new(Vec::<Registration<M>>::new()),
        }
    }

    fn typed<M: Message>(&self) -> Option<&Vec<Registration<M>>> {
        self.handlers.downcast_ref()
    }

    fn typed_mut<M: Message>(&mut self) -> Option<&mut Vec<Registration<M>>> {
        self.handlers.downcast_mut()
    }
}

/// Identity comparison for handler trait objects (data pointer only).
pub(crate) fn same_handler<M: Message>(a: &HandlerRef<M>, b: &HandlerRef<M>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Concurrent registry of handlers by message type.
#[derive(Default)]
pub struct HandlerRegistry {
    entries: DashMap<TypeId, Entry>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `M`.
    ///
    /// Returns `false` if the same instance was already registered.
    pub fn register<M: Message>(&self, handler: HandlerRef<M>) -> bool {
        self.register_wrapped(Arc::clone(&handler), handler)
    }

    /// Register `invoker` under the identity of `key`.
    ///
    /// Used to subscribe a handler through a pipeline while keeping
    /// `unregister(&key)` working.
    pub fn register_wrapped<M: Message>(&self, key: HandlerRef<M>, invoker: HandlerRef<M>) -> bool {
        let mut entry = self
            .entries
            .entry(TypeId::of::<M>())
            .or_insert_with(Entry::new::<M>);

        let Some(list) = entry.typed_mut::<M>() else {
            return false;
        };
        if list.iter().any(|r| same_handler(&r.key, &key)) {
            debug!(
                message_type = %MessageType::of::<M>(),
                handler = key.name(),
                "Handler already registered"
            );
            return false;
        }

        debug!(
            message_type = %MessageType::of::<M>(),
            handler = key.name(),
            "Handler registered"
        );
        list.push(Registration { key, invoker });
        entry.count += 1;
        true
    }

    /// Remove `handler` from `M`'s list. Returns whether it was present.
    pub fn unregister<M: Message>(&self, handler: &HandlerRef<M>) -> bool {
        let type_id = TypeId::of::<M>();
        let removed = match self.entries.get_mut(&type_id) {
            Some(mut entry) => {
                let before = entry.count;
                if let Some(list) = entry.typed_mut::<M>() {
                    list.retain(|r| !same_handler(&r.key, handler));
                    let after = list.len();
                    entry.count = after;
                }
                entry.count < before
            }
            None => false,
        };

        self.entries.remove_if(&type_id, |_, e| e.count == 0);

        if removed {
            debug!(
                message_type = %MessageType::of::<M>(),
                handler = handler.name(),
                "Handler unregistered"
            );
        }
        removed
    }

    /// Snapshot of the handlers to invoke for `M`, in registration order.
    #[must_use]
    pub fn lookup<M: Message>(&self) -> Vec<HandlerRef<M>> {
        self.entries
            .get(&TypeId::of::<M>())
            .and_then(|entry| {
                entry
                    .typed::<M>()
                    .map(|list| list.iter().map(|r| Arc::clone(&r.invoker)).collect())
            })
            .unwrap_or_default()
    }

    /// Whether this exact instance is registered for `M`.
    #[must_use]
    pub fn contains<M: Message>(&self, handler: &HandlerRef<M>) -> bool {
        self.entries
            .get(&TypeId::of::<M>())
            .and_then(|entry| {
                entry
                    .typed::<M>()
                    .map(|list| list.iter().any(|r| same_handler(&r.key, handler)))
            })
            .unwrap_or(false)
    }

    /// Number of handlers registered for `M`.
    #[must_use]
    pub fn handler_count<M: Message>(&self) -> usize {
        self.entries
            .get(&TypeId::of::<M>())
            .map_or(0, |entry| entry.count)
    }

    /// Number of handlers across all types.
    #[must_use]
    pub fn total_handlers(&self) -> usize {
        self.entries.iter().map(|entry| entry.count).sum()
    }

    /// Message types with at least one handler.
    #[must_use]
    pub fn message_types(&self) -> Vec<MessageType> {
        self.entries.iter().map(|entry| entry.message_type).collect()
    }

    /// Drop every registration.
    pub fn clear(&self) {
        self.entries.clear();
    }
}
