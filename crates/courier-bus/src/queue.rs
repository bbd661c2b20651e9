//! # Message Queue
//!
//! Queued (fire-and-forget) dispatch: one FIFO per message type, drained by
//! one background consumer task per type.
//!
//! ## Lifecycle
//!
//! ```text
//!                start()                 stop()
//!  NotStarted ───────────→ Running ───────────────→ Stopped
//!       │                    ↑                         │
//!       │                    └────────── start() ──────┘
//!       │                                              │
//!       └───────────────→ Disposed ←───────────────────┘
//!              dispose()  (also from Running)
//! ```
//!
//! - `enqueue` never waits for delivery. Consumers are spawned lazily, on
//!   the first enqueue for a type, and only while Running.
//! - `start` (re)spawns a consumer for every type with a backlog, so
//!   messages enqueued before start or while stopped are delivered.
//! - `stop` cancels the current run token; consumers exit at their next
//!   check without draining. A message whose dispatch was refused because
//!   of the stop goes back to the head of its FIFO and waits there for the
//!   next `start`; enqueueing while stopped does not wake it.
//! - A consumer still inside a handler when `start` runs again is waited on
//!   by its replacement, so one type never has two consumers popping.
//! - `dispose` stops, joins consumers within `dispose_timeout`, aborts any
//!   that overrun and drops every FIFO. Called from inside a consumer it
//!   skips waiting on that consumer.
//!
//! ## Ordering
//!
//! Dequeue order equals enqueue order for a single type. Nothing is
//! guaranteed across types.

use crate::config::QueueConfig;
use crate::dispatcher::{DispatchReport, Dispatcher};
use crate::error::{BusError, BusResult};
use crate::handler::invoke_isolated;
use crate::message::{Message, MessageType};
use crate::registry::HandlerRef;
use dashmap::DashMap;
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use std::any::{Any, TypeId};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

tokio::task_local! {
    /// Message type served by the consumer task currently running.
    static CURRENT_CONSUMER: TypeId;
}

/// Lifecycle state of a `MessageQueue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    NotStarted,
    Running,
    Stopped,
    Disposed,
}

struct Lifecycle {
    state: QueueState,
    /// Token for the current run; replaced on every start.
    run_token: CancellationToken,
}

/// Everything a consumer needs, detached from the queue itself.
#[derive(Clone)]
struct ConsumerContext {
    dispatcher: Arc<Dispatcher>,
    token: CancellationToken,
    config: QueueConfig,
}

struct Consumer {
    handle: JoinHandle<()>,
    token: CancellationToken,
}

impl Consumer {
    fn is_live(&self) -> bool {
        !self.handle.is_finished() && !self.token.is_cancelled()
    }
}

/// Type-erased control surface over a `TypedChannel<M>`.
trait Channel: Send + Sync {
    fn message_type(&self) -> MessageType;
    fn len(&self) -> usize;
    fn has_live_consumer(&self) -> bool;
    fn ensure_consumer(self: Arc<Self>, ctx: &ConsumerContext, handle: &Handle) -> bool;
    fn take_consumer(&self) -> Option<JoinHandle<()>>;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// FIFO and consumer slot for one message type.
struct TypedChannel<M: Message> {
    items: Mutex<VecDeque<M>>,
    delegate: RwLock<Option<HandlerRef<M>>>,
    consumer: Mutex<Option<Consumer>>,
}

impl<M: Message> TypedChannel<M> {
    fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            delegate: RwLock::new(None),
            consumer: Mutex::new(None),
        }
    }

    /// Append and return the new depth.
    fn push(&self, message: M) -> usize {
        let mut items = self.items.lock();
        items.push_back(message);
        items.len()
    }

    fn push_front(&self, message: M) {
        self.items.lock().push_front(message);
    }

    fn pop(&self) -> Option<M> {
        self.items.lock().pop_front()
    }

    /// Hand one message to the delegate, or to the dispatcher if none is set.
    async fn forward(&self, message: &M, ctx: &ConsumerContext) -> BusResult<DispatchReport> {
        let delegate = self.delegate.read().clone();
        match delegate {
            Some(handler) => {
                if ctx.token.is_cancelled() {
                    return Err(BusError::Cancelled);
                }
                let outcome = invoke_isolated(handler.as_ref(), message, &ctx.token).await;
                Ok(DispatchReport {
                    handlers: 1,
                    ..DispatchReport::default()
                }
                .record(outcome))
            }
            None => ctx.dispatcher.publish(message, &ctx.token).await,
        }
    }
}

impl<M: Message> Channel for TypedChannel<M> {
    fn message_type(&self) -> MessageType {
        MessageType::of::<M>()
    }

    fn len(&self) -> usize {
        self.items.lock().len()
    }

    fn has_live_consumer(&self) -> bool {
        self.consumer.lock().as_ref().is_some_and(Consumer::is_live)
    }

    fn ensure_consumer(self: Arc<Self>, ctx: &ConsumerContext, handle: &Handle) -> bool {
        let mut slot = self.consumer.lock();
        if slot.as_ref().is_some_and(Consumer::is_live) {
            return false;
        }

        // A stopped consumer may still be inside a handler. The replacement
        // waits for it so there is never more than one popping this FIFO.
        let draining = slot
            .take()
            .map(|previous| previous.handle)
            .filter(|previous| !previous.is_finished());

        let task = CURRENT_CONSUMER.scope(
            TypeId::of::<M>(),
            consume(Arc::clone(&self), ctx.clone(), draining),
        );
        *slot = Some(Consumer {
            handle: handle.spawn(task),
            token: ctx.token.clone(),
        });
        true
    }

    fn take_consumer(&self) -> Option<JoinHandle<()>> {
        self.consumer.lock().take().map(|consumer| consumer.handle)
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Consumer loop for one message type.
async fn consume<M: Message>(
    channel: Arc<TypedChannel<M>>,
    ctx: ConsumerContext,
    draining: Option<JoinHandle<()>>,
) {
    let message_type = MessageType::of::<M>();

    if let Some(previous) = draining {
        debug!(message_type = %message_type, "Waiting for stopped consumer to finish");
        if let Err(e) = previous.await {
            warn!(message_type = %message_type, error = %e, "Stopped consumer ended abnormally");
        }
    }

    debug!(message_type = %message_type, "Queue consumer started");

    loop {
        if ctx.token.is_cancelled() {
            break;
        }

        let Some(message) = channel.pop() else {
            tokio::select! {
                _ = ctx.token.cancelled() => break,
                _ = tokio::time::sleep(ctx.config.poll_interval) => {}
            }
            continue;
        };

        debug!(
            message_type = %message_type,
            message_id = %message.id(),
            remaining = channel.len(),
            "Message dequeued by consumer"
        );

        match channel.forward(&message, &ctx).await {
            Ok(report) if report.failed == 0 => {}
            Ok(report) => {
                error!(
                    message_type = %message_type,
                    message_id = %message.id(),
                    failed = report.failed,
                    "Queued message forwarded with handler failures"
                );
                tokio::select! {
                    _ = ctx.token.cancelled() => break,
                    _ = tokio::time::sleep(ctx.config.failure_cooldown) => {}
                }
            }
            Err(BusError::Cancelled) => {
                // Not delivered; it stays at the head until the next start.
                channel.push_front(message);
                break;
            }
            Err(e) => {
                error!(
                    message_type = %message_type,
                    message_id = %message.id(),
                    error = %e,
                    "Failed to forward queued message"
                );
                tokio::select! {
                    _ = ctx.token.cancelled() => break,
                    _ = tokio::time::sleep(ctx.config.failure_cooldown) => {}
                }
            }
        }
    }

    debug!(
        message_type = %message_type,
        abandoned = channel.len(),
        "Queue consumer stopped"
    );
}

/// Per-type FIFO queues with lazily started background consumers.
pub struct MessageQueue {
    dispatcher: Arc<Dispatcher>,
    channels: DashMap<TypeId, Arc<dyn Channel>>,
    lifecycle: Mutex<Lifecycle>,
    config: QueueConfig,
    messages_enqueued: AtomicU64,
}

impl MessageQueue {
    /// Create a queue forwarding to `dispatcher`.
    ///
    /// With `config.auto_start` the queue begins in `Running`.
    #[must_use]
    pub fn new(dispatcher: Arc<Dispatcher>, config: QueueConfig) -> Self {
        let state = if config.auto_start {
            QueueState::Running
        } else {
            QueueState::NotStarted
        };

        Self {
            dispatcher,
            channels: DashMap::new(),
            lifecycle: Mutex::new(Lifecycle {
                state,
                run_token: CancellationToken::new(),
            }),
            config,
            messages_enqueued: AtomicU64::new(0),
        }
    }

    /// Append `message` to its type's FIFO without waiting for delivery.
    ///
    /// # Errors
    ///
    /// - `BusError::Disposed` - the queue was disposed.
    /// - `BusError::RuntimeUnavailable` - a consumer must be spawned but no
    ///   tokio runtime is current; the message is not enqueued.
    pub fn enqueue<M: Message>(&self, message: M) -> BusResult<()> {
        let lifecycle = self.lifecycle.lock();
        if lifecycle.state == QueueState::Disposed {
            return Err(BusError::Disposed);
        }

        let channel = self.channel::<M>()?;
        let spawn_on = if lifecycle.state == QueueState::Running && !channel.has_live_consumer() {
            Some(runtime_handle::<M>()?)
        } else {
            None
        };

        let message_id = message.id();
        let depth = channel.push(message);
        self.messages_enqueued.fetch_add(1, Ordering::Relaxed);

        debug!(
            message_type = %MessageType::of::<M>(),
            message_id = %message_id,
            depth,
            "Message enqueued"
        );

        if let Some(handle) = spawn_on {
            let ctx = self.context(&lifecycle);
            if channel.ensure_consumer(&ctx, &handle) {
                debug!(message_type = %MessageType::of::<M>(), "Queue consumer spawned");
            }
        }

        Ok(())
    }

    /// Pull the next message of type `M`, polling until one arrives.
    ///
    /// Competes with a running consumer for the same type.
    ///
    /// # Errors
    ///
    /// - `BusError::Cancelled` - `cancel` fired before a message arrived.
    /// - `BusError::Disposed` - the queue was disposed.
    pub async fn dequeue<M: Message>(&self, cancel: &CancellationToken) -> BusResult<M> {
        loop {
            if self.state() == QueueState::Disposed {
                return Err(BusError::Disposed);
            }
            if cancel.is_cancelled() {
                return Err(BusError::Cancelled);
            }

            if let Some(message) = self.channel::<M>()?.pop() {
                debug!(
                    message_type = %MessageType::of::<M>(),
                    message_id = %message.id(),
                    "Message dequeued"
                );
                return Ok(message);
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(BusError::Cancelled),
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
    }

    /// Route `M`'s queued messages to `handler` instead of the dispatcher.
    ///
    /// # Errors
    ///
    /// - `BusError::Disposed` - the queue was disposed.
    pub fn set_delegate<M: Message>(&self, handler: HandlerRef<M>) -> BusResult<()> {
        if self.state() == QueueState::Disposed {
            return Err(BusError::Disposed);
        }
        let channel = self.channel::<M>()?;
        debug!(
            message_type = %MessageType::of::<M>(),
            handler = handler.name(),
            "Queue delegate set"
        );
        *channel.delegate.write() = Some(handler);
        Ok(())
    }

    /// Enter `Running` and spawn consumers for every backlogged type.
    ///
    /// Idempotent while running.
    ///
    /// # Errors
    ///
    /// - `BusError::Disposed` - the queue was disposed.
    /// - `BusError::RuntimeUnavailable` - a backlog exists but no tokio
    ///   runtime is current; the state is left unchanged.
    pub fn start(&self) -> BusResult<()> {
        let mut lifecycle = self.lifecycle.lock();
        match lifecycle.state {
            QueueState::Disposed => return Err(BusError::Disposed),
            QueueState::Running => return Ok(()),
            QueueState::NotStarted | QueueState::Stopped => {}
        }

        let backlog: Vec<Arc<dyn Channel>> = self
            .channels
            .iter()
            .filter(|entry| entry.value().len() > 0)
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let handle = if backlog.is_empty() {
            None
        } else {
            Some(Handle::try_current().map_err(|_| BusError::RuntimeUnavailable {
                message_type: backlog[0].message_type().name(),
            })?)
        };

        lifecycle.run_token = CancellationToken::new();
        lifecycle.state = QueueState::Running;

        if let Some(handle) = handle {
            let ctx = self.context(&lifecycle);
            for channel in backlog {
                let message_type = channel.message_type();
                let pending = channel.len();
                if channel.ensure_consumer(&ctx, &handle) {
                    debug!(
                        message_type = %message_type,
                        pending,
                        "Queue consumer spawned for backlog"
                    );
                }
            }
        }

        info!(channels = self.channels.len(), "Message queue started");
        Ok(())
    }

    /// Signal every consumer to exit. Idempotent; never waits.
    pub fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.state != QueueState::Running {
            return;
        }
        lifecycle.run_token.cancel();
        lifecycle.state = QueueState::Stopped;
        info!(pending = self.total_pending(), "Message queue stopped");
    }

    /// Stop, wait (bounded) for consumers, then release every FIFO.
    ///
    /// Idempotent. Pending messages are abandoned.
    pub async fn dispose(&self) {
        let consumers: Vec<(TypeId, JoinHandle<()>)> = {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state == QueueState::Disposed {
                return;
            }
            lifecycle.run_token.cancel();
            lifecycle.state = QueueState::Disposed;

            self.channels
                .iter()
                .filter_map(|entry| {
                    entry
                        .value()
                        .take_consumer()
                        .map(|handle| (*entry.key(), handle))
                })
                .collect()
        };

        let current = CURRENT_CONSUMER.try_with(|type_id| *type_id).ok();
        let waiting: Vec<JoinHandle<()>> = consumers
            .into_iter()
            .filter(|(type_id, _)| Some(*type_id) != current)
            .map(|(_, handle)| handle)
            .collect();
        let abort_handles: Vec<_> = waiting.iter().map(JoinHandle::abort_handle).collect();

        match tokio::time::timeout(self.config.dispose_timeout, join_all(waiting)).await {
            Ok(_) => debug!("All queue consumers exited"),
            Err(_) => {
                warn!(
                    timeout_ms = self.config.dispose_timeout.as_millis() as u64,
                    consumers = abort_handles.len(),
                    "Queue consumers did not exit in time, aborting"
                );
                for handle in abort_handles {
                    handle.abort();
                }
            }
        }

        let abandoned = self.total_pending();
        self.channels.clear();
        info!(abandoned, "Message queue disposed");
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> QueueState {
        self.lifecycle.lock().state
    }

    /// Messages waiting in `M`'s FIFO.
    #[must_use]
    pub fn pending<M: Message>(&self) -> usize {
        self.channels
            .get(&TypeId::of::<M>())
            .map_or(0, |channel| channel.len())
    }

    /// Messages waiting across all FIFOs.
    #[must_use]
    pub fn total_pending(&self) -> usize {
        self.channels.iter().map(|entry| entry.value().len()).sum()
    }

    /// Consumers currently alive.
    #[must_use]
    pub fn consumer_count(&self) -> usize {
        self.channels
            .iter()
            .filter(|entry| entry.value().has_live_consumer())
            .count()
    }

    /// Total successful `enqueue` calls.
    pub fn messages_enqueued(&self) -> u64 {
        self.messages_enqueued.load(Ordering::Relaxed)
    }

    /// The dispatcher consumers forward to.
    #[must_use]
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    #[must_use]
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    fn context(&self, lifecycle: &Lifecycle) -> ConsumerContext {
        ConsumerContext {
            dispatcher: Arc::clone(&self.dispatcher),
            token: lifecycle.run_token.clone(),
            config: self.config.clone(),
        }
    }

    /// Get or create the channel for `M`.
    fn channel<M: Message>(&self) -> BusResult<Arc<TypedChannel<M>>> {
        let erased = Arc::clone(
            self.channels
                .entry(TypeId::of::<M>())
                .or_insert_with(|| Arc::new(TypedChannel::<M>::new()))
                .value(),
        );

        erased
            .into_any()
            .downcast::<TypedChannel<M>>()
            .map_err(|_| BusError::TypeMismatch {
                message_type: std::any::type_name::<M>(),
            })
    }
}

impl Drop for MessageQueue {
    fn drop(&mut self) {
        self.lifecycle.get_mut().run_token.cancel();
    }
}

fn runtime_handle<M: Message>() -> BusResult<Handle> {
    Handle::try_current().map_err(|_| BusError::RuntimeUnavailable {
        message_type: std::any::type_name::<M>(),
    })
}
