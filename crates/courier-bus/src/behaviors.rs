//! Standard pipeline behaviors.

use crate::error::HandlerResult;
use crate::message::{Message, MessageType};
use crate::pipeline::{Behavior, Next};
use async_trait::async_trait;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Times the rest of the chain. Always continues; failures are logged and
/// passed through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimingBehavior;

#[async_trait]
impl<M: Message> Behavior<M> for TimingBehavior {
    async fn handle(
        &self,
        message: &M,
        cancel: &CancellationToken,
        next: Next<'_, M>,
    ) -> HandlerResult {
        let started = Instant::now();
        let result = next.run(message, cancel).await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        match &result {
            Ok(()) => debug!(
                message_type = %MessageType::of::<M>(),
                message_id = %message.id(),
                elapsed_ms,
                "Handler completed"
            ),
            Err(e) => error!(
                message_type = %MessageType::of::<M>(),
                message_id = %message.id(),
                elapsed_ms,
                error = %e,
                "Handler failed"
            ),
        }

        result
    }

    fn name(&self) -> &str {
        "timing"
    }
}

/// Catches failures from the rest of the chain.
///
/// With `rethrow` the failure is logged and returned; without it the
/// failure is logged and the chain reports success. Cancellation always
/// passes through.
#[derive(Debug, Clone, Copy)]
pub struct ErrorContainmentBehavior {
    pub rethrow: bool,
}

impl ErrorContainmentBehavior {
    /// Log and swallow failures.
    #[must_use]
    pub fn swallow() -> Self {
        Self { rethrow: false }
    }

    /// Log and re-raise failures.
    #[must_use]
    pub fn rethrow() -> Self {
        Self { rethrow: true }
    }
}

#[async_trait]
impl<M: Message> Behavior<M> for ErrorContainmentBehavior {
    async fn handle(
        &self,
        message: &M,
        cancel: &CancellationToken,
        next: Next<'_, M>,
    ) -> HandlerResult {
        match next.run(message, cancel).await {
            Err(e) if !e.is_cancelled() => {
                warn!(
                    message_type = %MessageType::of::<M>(),
                    message_id = %message.id(),
                    error = %e,
                    rethrow = self.rethrow,
                    "Handler failure contained"
                );
                if self.rethrow {
                    Err(e)
                } else {
                    Ok(())
                }
            }
            other => other,
        }
    }

    fn name(&self) -> &str {
        "error-containment"
    }
}
