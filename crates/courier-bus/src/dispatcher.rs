//! # Direct Dispatcher
//!
//! Fan-out publishing: resolve every handler for the message's type, run
//! them concurrently and wait for all of them.
//!
//! ## Resolution Order
//!
//! 1. The `HandlerRegistry` (subscribed instances).
//! 2. The `HandlerCatalog`, only if the registry has nothing for the type.
//! 3. Nothing found: warning logged, empty report, still `Ok`.
//!
//! ## Failure Isolation
//!
//! Each handler runs behind `invoke_isolated`, so the isolation boundary
//! wraps the awaited result and not just the call expression. A handler
//! that fails (or panics) asynchronously is logged and counted; the other
//! handlers in the same fan-out still run and are still awaited.

use crate::catalog::HandlerCatalog;
use crate::error::{BusError, BusResult};
use crate::handler::{invoke_isolated, HandlerOutcome};
use crate::message::{Message, MessageType};
use crate::registry::{HandlerRef, HandlerRegistry};
use futures::future::join_all;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Summary of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Handlers resolved for the message.
    pub handlers: usize,
    /// Handlers that returned `Ok`.
    pub succeeded: usize,
    /// Handlers that failed or panicked.
    pub failed: usize,
    /// Handlers not run because of cancellation.
    pub skipped: usize,
}

impl DispatchReport {
    pub(crate) fn record(mut self, outcome: HandlerOutcome) -> Self {
        match outcome {
            HandlerOutcome::Succeeded => self.succeeded += 1,
            HandlerOutcome::Failed => self.failed += 1,
            HandlerOutcome::Skipped => self.skipped += 1,
        }
        self
    }

    /// No handler was found for the message.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers == 0
    }

    /// Every resolved handler succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.succeeded == self.handlers
    }
}

/// Fan-out dispatcher over a shared registry.
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    catalog: Option<Arc<HandlerCatalog>>,
    messages_published: AtomicU64,
}

impl Dispatcher {
    /// Dispatcher over `registry`, without a fallback source.
    #[must_use]
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self {
            registry,
            catalog: None,
            messages_published: AtomicU64::new(0),
        }
    }

    /// Dispatcher that falls back to `catalog` for types with no subscribers.
    #[must_use]
    pub fn with_catalog(registry: Arc<HandlerRegistry>, catalog: Arc<HandlerCatalog>) -> Self {
        Self {
            registry,
            catalog: Some(catalog),
            messages_published: AtomicU64::new(0),
        }
    }

    /// The registry handlers are resolved from.
    #[must_use]
    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// The fallback catalog, if any.
    #[must_use]
    pub fn catalog(&self) -> Option<&Arc<HandlerCatalog>> {
        self.catalog.as_ref()
    }

    /// Deliver `message` to every handler for `M` and wait for all of them.
    ///
    /// # Errors
    ///
    /// - `BusError::Cancelled` - `cancel` fired before dispatch began.
    ///
    /// Handler failures are never returned; see [`DispatchReport`].
    pub async fn publish<M: Message>(
        &self,
        message: &M,
        cancel: &CancellationToken,
    ) -> BusResult<DispatchReport> {
        let message_type = MessageType::of::<M>();

        if cancel.is_cancelled() {
            return Err(BusError::Cancelled);
        }

        self.messages_published.fetch_add(1, Ordering::Relaxed);

        let handlers = self.resolve::<M>();
        if handlers.is_empty() {
            warn!(
                message_type = %message_type,
                message_id = %message.id(),
                "No handler found for message"
            );
            return Ok(DispatchReport::default());
        }

        debug!(
            message_type = %message_type,
            message_id = %message.id(),
            handlers = handlers.len(),
            "Dispatching message"
        );

        let outcomes = join_all(
            handlers
                .iter()
                .map(|handler| invoke_isolated(handler.as_ref(), message, cancel)),
        )
        .await;

        let report = outcomes.into_iter().fold(
            DispatchReport {
                handlers: handlers.len(),
                ..DispatchReport::default()
            },
            DispatchReport::record,
        );

        debug!(
            message_type = %message_type,
            message_id = %message.id(),
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            "Message dispatched"
        );

        Ok(report)
    }

    /// Total `publish` calls that reached handler resolution.
    pub fn messages_published(&self) -> u64 {
        self.messages_published.load(Ordering::Relaxed)
    }

    fn resolve<M: Message>(&self) -> Vec<HandlerRef<M>> {
        let handlers = self.registry.lookup::<M>();
        if !handlers.is_empty() {
            return handlers;
        }

        match &self.catalog {
            Some(catalog) => {
                let resolved = catalog.resolve::<M>();
                if !resolved.is_empty() {
                    debug!(
                        message_type = %MessageType::of::<M>(),
                        handlers = resolved.len(),
                        "Resolved handlers from catalog"
                    );
                }
                resolved
            }
            None => Vec::new(),
        }
    }
}
