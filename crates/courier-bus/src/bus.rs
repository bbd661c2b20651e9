//! # Message Bus
//!
//! The public surface over the registry, the dispatcher and the queue.
//!
//! | Operation | Path |
//! |-----------|------|
//! | `publish` | direct fan-out, waits for every handler |
//! | `send` | per-type queue, returns immediately |
//! | `subscribe` / `subscribe_with` | registry (optionally pipeline-wrapped) |
//! | `unsubscribe` | registry, by the `Arc` passed to `subscribe` |
//!
//! One bus is built per process by the host's composition root and shared
//! as `Arc<MessageBus>`; there is no global instance.

use crate::catalog::HandlerCatalog;
use crate::config::QueueConfig;
use crate::dispatcher::{DispatchReport, Dispatcher};
use crate::error::{BusError, BusResult};
use crate::message::{Message, MessageType};
use crate::pipeline::PipelineBuilder;
use crate::queue::{MessageQueue, QueueState};
use crate::registry::{HandlerRef, HandlerRegistry};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// In-process publish/subscribe bus.
pub struct MessageBus {
    registry: Arc<HandlerRegistry>,
    dispatcher: Arc<Dispatcher>,
    queue: MessageQueue,
    disposed: AtomicBool,
}

impl MessageBus {
    /// Bus with no fallback handler source.
    #[must_use]
    pub fn new(config: QueueConfig) -> Self {
        let registry = Arc::new(HandlerRegistry::new());
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&registry)));
        Self::assemble(registry, dispatcher, config)
    }

    /// Bus that resolves from `catalog` for types nobody subscribed to.
    #[must_use]
    pub fn with_catalog(config: QueueConfig, catalog: Arc<HandlerCatalog>) -> Self {
        let registry = Arc::new(HandlerRegistry::new());
        let dispatcher = Arc::new(Dispatcher::with_catalog(Arc::clone(&registry), catalog));
        Self::assemble(registry, dispatcher, config)
    }

    fn assemble(
        registry: Arc<HandlerRegistry>,
        dispatcher: Arc<Dispatcher>,
        config: QueueConfig,
    ) -> Self {
        let queue = MessageQueue::new(Arc::clone(&dispatcher), config);
        Self {
            registry,
            dispatcher,
            queue,
            disposed: AtomicBool::new(false),
        }
    }

    /// Deliver `message` to every handler now and wait for all of them.
    ///
    /// # Errors
    ///
    /// - `BusError::Disposed` - the bus was disposed.
    /// - `BusError::Cancelled` - `cancel` fired before dispatch.
    pub async fn publish<M: Message>(
        &self,
        message: &M,
        cancel: &CancellationToken,
    ) -> BusResult<DispatchReport> {
        self.ensure_live()?;
        self.dispatcher.publish(message, cancel).await
    }

    /// Queue `message` for background delivery.
    ///
    /// # Errors
    ///
    /// - `BusError::Disposed` - the bus was disposed.
    /// - `BusError::RuntimeUnavailable` - see [`MessageQueue::enqueue`].
    pub fn send<M: Message>(&self, message: M) -> BusResult<()> {
        self.ensure_live()?;
        self.queue.enqueue(message)
    }

    /// Pull the next queued `M` directly, bypassing subscribers.
    ///
    /// # Errors
    ///
    /// - `BusError::Disposed` - the bus was disposed.
    /// - `BusError::Cancelled` - `cancel` fired first.
    pub async fn receive<M: Message>(&self, cancel: &CancellationToken) -> BusResult<M> {
        self.ensure_live()?;
        self.queue.dequeue(cancel).await
    }

    /// Register `handler` for `M`. Returns `false` if it was already
    /// registered.
    ///
    /// # Errors
    ///
    /// - `BusError::Disposed` - the bus was disposed.
    pub fn subscribe<M: Message>(&self, handler: HandlerRef<M>) -> BusResult<bool> {
        self.ensure_live()?;
        Ok(self.registry.register(handler))
    }

    /// Register `handler` behind a pipeline built by `configure`.
    ///
    /// The subscription is keyed by `handler`, so `unsubscribe(&handler)`
    /// removes the wrapped pipeline as well.
    ///
    /// # Errors
    ///
    /// - `BusError::Disposed` - the bus was disposed.
    pub fn subscribe_with<M, F>(&self, handler: HandlerRef<M>, configure: F) -> BusResult<bool>
    where
        M: Message,
        F: FnOnce(PipelineBuilder<M>) -> PipelineBuilder<M>,
    {
        self.ensure_live()?;
        let pipeline = configure(PipelineBuilder::new(Arc::clone(&handler))).build();
        debug!(
            message_type = %MessageType::of::<M>(),
            handler = handler.name(),
            behaviors = pipeline.len(),
            "Subscribing through pipeline"
        );
        Ok(self.registry.register_wrapped(handler, Arc::new(pipeline)))
    }

    /// Remove the subscription made with `handler`. Returns `false` if
    /// there was none.
    ///
    /// # Errors
    ///
    /// - `BusError::Disposed` - the bus was disposed.
    pub fn unsubscribe<M: Message>(&self, handler: &HandlerRef<M>) -> BusResult<bool> {
        self.ensure_live()?;
        Ok(self.registry.unregister(handler))
    }

    /// Start background delivery of queued messages.
    ///
    /// # Errors
    ///
    /// - `BusError::Disposed` - the bus was disposed.
    /// - `BusError::RuntimeUnavailable` - see [`MessageQueue::start`].
    pub fn start(&self) -> BusResult<()> {
        self.ensure_live()?;
        self.queue.start()
    }

    /// Stop background delivery. Queued messages stay queued.
    pub fn stop(&self) {
        self.queue.stop();
    }

    /// Shut down the queue and drop every subscription. Idempotent.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.queue.dispose().await;
        self.registry.clear();
        info!(
            published = self.dispatcher.messages_published(),
            enqueued = self.queue.messages_enqueued(),
            "Message bus disposed"
        );
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn state(&self) -> QueueState {
        self.queue.state()
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    #[must_use]
    pub fn queue(&self) -> &MessageQueue {
        &self.queue
    }

    fn ensure_live(&self) -> BusResult<()> {
        if self.is_disposed() {
            return Err(BusError::Disposed);
        }
        Ok(())
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new(QueueConfig::default())
    }
}
