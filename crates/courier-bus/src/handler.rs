//! # Message Handlers
//!
//! Handlers are registered per message type and invoked by the dispatcher,
//! either directly from `publish` or from a queue consumer loop.
//!
//! ## Failure Isolation
//!
//! Every invocation goes through [`invoke_isolated`]. It contains failures
//! from both halves of the call: a panic while the handler builds its future
//! and an error or panic raised later while that future is awaited. Either
//! way the failure is logged with the handler's name and reported as
//! [`HandlerOutcome::Failed`]; it never reaches the publisher.

use crate::error::{HandlerError, HandlerResult};
use crate::message::{Message, MessageType};
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// A unit of behavior that processes messages of type `M`.
///
/// Instances registered once may be invoked concurrently by several
/// publishers; implementations must be safe for that.
#[async_trait]
pub trait MessageHandler<M: Message>: Send + Sync {
    /// Process one message.
    async fn handle(&self, message: &M, cancel: &CancellationToken) -> HandlerResult;

    /// Identity used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Result of a single isolated handler invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// The handler returned `Ok`.
    Succeeded,
    /// The handler returned an error or panicked.
    Failed,
    /// The handler never ran, or stopped on the cancellation signal.
    Skipped,
}

/// Invoke `handler` with failure isolation.
pub async fn invoke_isolated<M: Message>(
    handler: &dyn MessageHandler<M>,
    message: &M,
    cancel: &CancellationToken,
) -> HandlerOutcome {
    let message_type = MessageType::of::<M>();

    if cancel.is_cancelled() {
        debug!(
            handler = handler.name(),
            message_type = %message_type,
            message_id = %message.id(),
            "Handler skipped (cancelled)"
        );
        return HandlerOutcome::Skipped;
    }

    let future = match std::panic::catch_unwind(AssertUnwindSafe(|| {
        handler.handle(message, cancel)
    })) {
        Ok(future) => future,
        Err(panic) => return report_panic(handler, message, message_type, panic.as_ref()),
    };

    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(Ok(())) => HandlerOutcome::Succeeded,
        Ok(Err(HandlerError::Cancelled)) => {
            debug!(
                handler = handler.name(),
                message_type = %message_type,
                message_id = %message.id(),
                "Handler stopped on cancellation"
            );
            HandlerOutcome::Skipped
        }
        Ok(Err(e)) => {
            error!(
                handler = handler.name(),
                message_type = %message_type,
                message_id = %message.id(),
                error = %e,
                "Handler failed"
            );
            HandlerOutcome::Failed
        }
        Err(panic) => report_panic(handler, message, message_type, panic.as_ref()),
    }
}

fn report_panic<M: Message>(
    handler: &dyn MessageHandler<M>,
    message: &M,
    message_type: MessageType,
    panic: &(dyn Any + Send),
) -> HandlerOutcome {
    error!(
        handler = handler.name(),
        message_type = %message_type,
        message_id = %message.id(),
        error = %HandlerError::Panicked(panic_message(panic)),
        "Handler panicked"
    );
    HandlerOutcome::Failed
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Adapter turning a synchronous closure into a handler.
pub struct FnHandler<M, F> {
    name: String,
    func: F,
    _message: PhantomData<fn(&M)>,
}

/// Wrap a closure as a named handler.
pub fn handler_fn<M, F>(name: impl Into<String>, func: F) -> FnHandler<M, F>
where
    M: Message,
    F: Fn(&M) -> HandlerResult + Send + Sync,
{
    FnHandler {
        name: name.into(),
        func,
        _message: PhantomData,
    }
}

#[async_trait]
impl<M, F> MessageHandler<M> for FnHandler<M, F>
where
    M: Message,
    F: Fn(&M) -> HandlerResult + Send + Sync,
{
    async fn handle(&self, message: &M, _cancel: &CancellationToken) -> HandlerResult {
        (self.func)(message)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
