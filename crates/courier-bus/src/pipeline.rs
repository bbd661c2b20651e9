//! # Handler Pipeline
//!
//! Ordered behaviors wrapped around one terminal handler.
//!
//! ```text
//! execute(msg) → behavior[0] ─next→ behavior[1] ─next→ … ─next→ terminal
//! ```
//!
//! Each behavior receives a [`Next`] continuation over the rest of the
//! chain. Calling `next.run(..)` descends one level; not calling it
//! short-circuits everything below. `Next` is consumed by value, so a
//! behavior cannot run the remainder twice.
//!
//! Behaviors run in the order they were added, outermost first. The chain
//! is fixed once [`PipelineBuilder::build`] returns.

use crate::error::HandlerResult;
use crate::handler::MessageHandler;
use crate::message::Message;
use crate::registry::HandlerRef;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Cross-cutting wrapper around handler invocation.
#[async_trait]
pub trait Behavior<M: Message>: Send + Sync {
    /// Observe, delay or suppress the rest of the chain.
    async fn handle(&self, message: &M, cancel: &CancellationToken, next: Next<'_, M>)
        -> HandlerResult;

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// The remainder of a pipeline, as seen from one behavior.
pub struct Next<'a, M: Message> {
    behaviors: &'a [Arc<dyn Behavior<M>>],
    terminal: &'a dyn MessageHandler<M>,
}

impl<'a, M: Message> Next<'a, M> {
    /// Run the remaining behaviors and then the terminal handler.
    pub async fn run(self, message: &M, cancel: &CancellationToken) -> HandlerResult {
        match self.behaviors.split_first() {
            Some((behavior, rest)) => {
                let next = Next {
                    behaviors: rest,
                    terminal: self.terminal,
                };
                behavior.handle(message, cancel, next).await
            }
            None => self.terminal.handle(message, cancel).await,
        }
    }

    /// Behaviors still ahead of the terminal handler.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.behaviors.len()
    }
}

/// A terminal handler and its fixed chain of behaviors.
pub struct Pipeline<M: Message> {
    behaviors: Vec<Arc<dyn Behavior<M>>>,
    terminal: HandlerRef<M>,
}

impl<M: Message> Pipeline<M> {
    /// Run the chain once for `message`.
    pub async fn execute(&self, message: &M, cancel: &CancellationToken) -> HandlerResult {
        Next {
            behaviors: &self.behaviors,
            terminal: self.terminal.as_ref(),
        }
        .run(message, cancel)
        .await
    }

    /// The wrapped handler.
    #[must_use]
    pub fn terminal(&self) -> &HandlerRef<M> {
        &self.terminal
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.behaviors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.behaviors.is_empty()
    }
}

#[async_trait]
impl<M: Message> MessageHandler<M> for Pipeline<M> {
    async fn handle(&self, message: &M, cancel: &CancellationToken) -> HandlerResult {
        self.execute(message, cancel).await
    }

    fn name(&self) -> &str {
        self.terminal.name()
    }
}

/// Builder for [`Pipeline`].
pub struct PipelineBuilder<M: Message> {
    behaviors: Vec<Arc<dyn Behavior<M>>>,
    terminal: HandlerRef<M>,
}

impl<M: Message> PipelineBuilder<M> {
    pub fn new(terminal: HandlerRef<M>) -> Self {
        Self {
            behaviors: Vec::new(),
            terminal,
        }
    }

    /// Append a behavior inside the ones already added.
    #[must_use]
    pub fn with<B: Behavior<M> + 'static>(mut self, behavior: B) -> Self {
        self.behaviors.push(Arc::new(behavior));
        self
    }

    /// Append an already shared behavior.
    #[must_use]
    pub fn with_shared(mut self, behavior: Arc<dyn Behavior<M>>) -> Self {
        self.behaviors.push(behavior);
        self
    }

    #[must_use]
    pub fn build(self) -> Pipeline<M> {
        Pipeline {
            behaviors: self.behaviors,
            terminal: self.terminal,
        }
    }
}
