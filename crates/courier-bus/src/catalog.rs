//! # Handler Catalog
//!
//! Secondary handler source for the dispatcher, populated by the host's
//! composition root. Where the registry holds live subscribed instances,
//! the catalog holds factories: every `resolve` builds fresh handlers, the
//! way a container resolves transient services.
//!
//! The dispatcher only consults the catalog for a message type that has no
//! registry entries.

use crate::error::{HandlerError, HandlerResult};
use crate::handler::{panic_message, MessageHandler};
use crate::message::{Message, MessageType};
use crate::registry::HandlerRef;
use async_trait::async_trait;
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

type Factory<M> = Arc<dyn Fn() -> HandlerRef<M> + Send + Sync>;

/// Factories for handlers, keyed by message type.
#[derive(Default)]
pub struct HandlerCatalog {
    /// `Vec<Factory<M>>` per `TypeId::of::<M>()`.
    factories: DashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl HandlerCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a factory producing handlers for `M`.
    pub fn provide<M, F, H>(&self, factory: F)
    where
        M: Message,
        H: MessageHandler<M> + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        let factory: Factory<M> = Arc::new(move || Arc::new(factory()) as HandlerRef<M>);
        let mut entry = self
            .factories
            .entry(TypeId::of::<M>())
            .or_insert_with(|| Box::new(Vec::<Factory<M>>::new()));
        if let Some(list) = entry.downcast_mut::<Vec<Factory<M>>>() {
            list.push(factory);
            debug!(
                message_type = %MessageType::of::<M>(),
                factories = list.len(),
                "Handler factory added to catalog"
            );
        }
    }

    /// Build one handler from every factory registered for `M`.
    ///
    /// A factory that panics yields a handler that fails every message, so
    /// the dispatch still counts it and the remaining factories still run.
    #[must_use]
    pub fn resolve<M: Message>(&self) -> Vec<HandlerRef<M>> {
        // Clone the factories out so user code never runs under the shard lock.
        let factories: Vec<Factory<M>> = self
            .factories
            .get(&TypeId::of::<M>())
            .and_then(|entry| entry.downcast_ref::<Vec<Factory<M>>>().cloned())
            .unwrap_or_default();

        factories
            .iter()
            .map(|factory| {
                catch_unwind(AssertUnwindSafe(|| factory())).unwrap_or_else(|panic| {
                    let reason = panic_message(panic.as_ref());
                    error!(
                        message_type = %MessageType::of::<M>(),
                        error = %reason,
                        "Handler factory panicked"
                    );
                    Arc::new(BrokenFactory { reason }) as HandlerRef<M>
                })
            })
            .collect()
    }

    /// Whether any factory exists for `M`.
    #[must_use]
    pub fn provides<M: Message>(&self) -> bool {
        self.factories.contains_key(&TypeId::of::<M>())
    }

    /// Remove every factory.
    pub fn clear(&self) {
        self.factories.clear();
    }
}

/// Stand-in for a handler whose factory panicked.
struct BrokenFactory {
    reason: String,
}

#[async_trait]
impl<M: Message> MessageHandler<M> for BrokenFactory {
    async fn handle(&self, _message: &M, _cancel: &CancellationToken) -> HandlerResult {
        Err(HandlerError::Panicked(format!(
            "handler factory panicked: {}",
            self.reason
        )))
    }

    fn name(&self) -> &str {
        "broken-factory"
    }
}
