//! # Pipelines on the Bus
//!
//! Behaviors wrap subscriptions made with `subscribe_with`, for both direct
//! and queued delivery.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use courier_bus::{
        Behavior, CancellationToken, ErrorContainmentBehavior, HandlerError, HandlerRef,
        HandlerResult, Message, Next, TimingBehavior,
    };
    use parking_lot::Mutex;

    use crate::fixtures::{fast_bus, wait_for, Fault, Faulty, Keyed, Order, Ping, Recorder};

    /// Appends its label on the way in and on the way out.
    struct Trace {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl<M: Message> Behavior<M> for Trace {
        async fn handle(
            &self,
            message: &M,
            cancel: &CancellationToken,
            next: Next<'_, M>,
        ) -> HandlerResult {
            self.log.lock().push(format!("{}:in", self.label));
            let result = next.run(message, cancel).await;
            self.log.lock().push(format!("{}:out", self.label));
            result
        }
    }

    /// Drops messages whose key is odd.
    struct EvenOnly;

    #[async_trait]
    impl<M: Keyed> Behavior<M> for EvenOnly {
        async fn handle(
            &self,
            message: &M,
            cancel: &CancellationToken,
            next: Next<'_, M>,
        ) -> HandlerResult {
            if message.key() % 2 == 0 {
                next.run(message, cancel).await
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_behaviors_nest_in_registration_order() {
        let bus = fast_bus();
        let log = Arc::new(Mutex::new(Vec::new()));
        let recorder = Recorder::<Ping>::new();
        let handler: HandlerRef<Ping> = recorder.clone();

        bus.subscribe_with(handler, |pipeline| {
            pipeline
                .with(Trace {
                    label: "outer",
                    log: Arc::clone(&log),
                })
                .with(Trace {
                    label: "inner",
                    log: Arc::clone(&log),
                })
        })
        .unwrap();

        bus.publish(&Ping::with_key(1), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(recorder.count(), 1);
        assert_eq!(
            *log.lock(),
            vec!["outer:in", "inner:in", "inner:out", "outer:out"]
        );
    }

    #[tokio::test]
    async fn test_short_circuit_skips_inner_chain() {
        let bus = fast_bus();
        let log = Arc::new(Mutex::new(Vec::new()));
        let recorder = Recorder::<Order>::new();
        let handler: HandlerRef<Order> = recorder.clone();

        bus.subscribe_with(handler, |pipeline| {
            pipeline.with(EvenOnly).with(Trace {
                label: "inner",
                log: Arc::clone(&log),
            })
        })
        .unwrap();

        for key in 1..=4 {
            bus.send(Order::with_key(key)).unwrap();
        }
        wait_for(|| log.lock().len() == 4).await;

        assert_eq!(recorder.keys(), vec![2, 4]);
        bus.dispose().await;
    }

    #[tokio::test]
    async fn test_containment_turns_failure_into_success() {
        let bus = fast_bus();
        let broken: HandlerRef<Ping> = Faulty::new(Fault::FailAfterAwait);
        bus.subscribe_with(broken, |pipeline| {
            pipeline
                .with(TimingBehavior)
                .with(ErrorContainmentBehavior::swallow())
        })
        .unwrap();

        let report = bus
            .publish(&Ping::with_key(1), &CancellationToken::new())
            .await
            .unwrap();

        assert!(report.all_succeeded());
    }

    #[tokio::test]
    async fn test_rethrow_keeps_failure_visible() {
        let bus = fast_bus();
        let broken: HandlerRef<Ping> = Faulty::new(Fault::FailAfterAwait);
        bus.subscribe_with(broken, |pipeline| {
            pipeline.with(ErrorContainmentBehavior::rethrow())
        })
        .unwrap();

        let report = bus
            .publish(&Ping::with_key(1), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.failed, 1);
    }

    #[tokio::test]
    async fn test_panic_inside_pipeline_is_isolated() {
        let bus = fast_bus();
        let broken: HandlerRef<Ping> = Faulty::new(Fault::PanicAfterAwait);
        let healthy = Recorder::<Ping>::new();
        bus.subscribe_with(broken, |pipeline| pipeline.with(TimingBehavior))
            .unwrap();
        bus.subscribe::<Ping>(healthy.clone()).unwrap();

        let report = bus
            .publish(&Ping::with_key(9), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(healthy.keys(), vec![9]);
    }

    #[tokio::test]
    async fn test_unsubscribe_removes_wrapped_handler() {
        let bus = fast_bus();
        let recorder = Recorder::<Ping>::new();
        let handler: HandlerRef<Ping> = recorder.clone();
        bus.subscribe_with(Arc::clone(&handler), |pipeline| {
            pipeline.with(TimingBehavior)
        })
        .unwrap();

        assert!(bus.unsubscribe(&handler).unwrap());
        let report = bus
            .publish(&Ping::with_key(1), &CancellationToken::new())
            .await
            .unwrap();

        assert!(report.is_empty());
        assert_eq!(recorder.count(), 0);
    }

    #[tokio::test]
    async fn test_failure_reported_through_terminal() {
        let bus = fast_bus();
        let failing: HandlerRef<Ping> = Arc::new(courier_bus::handler_fn(
            "rejects-odd",
            |ping: &Ping| -> HandlerResult {
                if ping.key() % 2 == 1 {
                    Err(HandlerError::failed("odd ping"))
                } else {
                    Ok(())
                }
            },
        ));
        bus.subscribe_with(failing, |pipeline| pipeline.with(TimingBehavior))
            .unwrap();

        let cancel = CancellationToken::new();
        let odd = bus.publish(&Ping::with_key(1), &cancel).await.unwrap();
        let even = bus.publish(&Ping::with_key(2), &cancel).await.unwrap();

        assert_eq!(odd.failed, 1);
        assert!(even.all_succeeded());
    }
}
