//! # Metrics Behavior
//!
//! Pipeline behavior feeding the Prometheus handler metrics. It sits
//! outermost so the measured duration covers every inner behavior too.

use std::time::Instant;

use async_trait::async_trait;
use courier_bus::{Behavior, CancellationToken, HandlerResult, Message, MessageType, Next};
use courier_telemetry::observe_handler;

/// Records `courier_bus_handler_duration_seconds` and
/// `courier_bus_handler_failures_total` per message type.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsBehavior;

#[async_trait]
impl<M: Message> Behavior<M> for MetricsBehavior {
    async fn handle(
        &self,
        message: &M,
        cancel: &CancellationToken,
        next: Next<'_, M>,
    ) -> HandlerResult {
        let started = Instant::now();
        let result = next.run(message, cancel).await;

        let failed = matches!(&result, Err(e) if !e.is_cancelled());
        observe_handler(
            MessageType::of::<M>().short_name(),
            started.elapsed().as_secs_f64(),
            failed,
        );
        result
    }

    fn name(&self) -> &str {
        "metrics"
    }
}
