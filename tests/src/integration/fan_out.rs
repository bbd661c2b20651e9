//! # Direct Publish
//!
//! - Every registered handler sees each message exactly once
//! - A broken handler never fails `publish` nor hides the others
//! - The catalog is only consulted when nobody subscribed

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use courier_bus::{
        BusError, CancellationToken, HandlerCatalog, HandlerRef, HandlerResult, Message,
        MessageBus, MessageHandler,
    };

    use crate::fixtures::{fast_bus, fast_queue, Fault, Faulty, Keyed, Ping, Recorder};

    #[tokio::test]
    async fn test_fan_out_completeness() {
        for n in [0usize, 1, 2, 5] {
            let bus = fast_bus();
            let recorders: Vec<Arc<Recorder<Ping>>> = (0..n).map(|_| Recorder::new()).collect();
            for recorder in &recorders {
                bus.subscribe::<Ping>(recorder.clone()).unwrap();
            }

            let ping = Ping::with_key(7);
            let report = bus.publish(&ping, &CancellationToken::new()).await.unwrap();

            assert_eq!(report.handlers, n);
            assert_eq!(report.succeeded, n);
            for recorder in &recorders {
                assert_eq!(recorder.ids(), vec![ping.id().to_string()]);
                assert_eq!(recorder.keys(), vec![7]);
            }
            bus.dispose().await;
        }
    }

    #[tokio::test]
    async fn test_failure_isolation_for_every_fault_kind() {
        for fault in [
            Fault::PanicImmediately,
            Fault::FailAfterAwait,
            Fault::PanicAfterAwait,
        ] {
            let bus = fast_bus();
            let broken = Faulty::new(fault);
            let healthy = Recorder::<Ping>::new();
            bus.subscribe::<Ping>(broken.clone()).unwrap();
            bus.subscribe::<Ping>(healthy.clone()).unwrap();

            let report = bus
                .publish(&Ping::with_key(7), &CancellationToken::new())
                .await
                .unwrap();

            assert_eq!(broken.calls(), 1, "{fault:?}");
            assert_eq!(healthy.keys(), vec![7], "{fault:?}");
            assert_eq!(report.failed, 1, "{fault:?}");
            assert_eq!(report.succeeded, 1, "{fault:?}");
            bus.dispose().await;
        }
    }

    #[tokio::test]
    async fn test_duplicate_subscription_is_ignored() {
        let bus = fast_bus();
        let recorder = Recorder::<Ping>::new();
        let handler: HandlerRef<Ping> = recorder.clone();

        assert!(bus.subscribe(Arc::clone(&handler)).unwrap());
        assert!(!bus.subscribe(Arc::clone(&handler)).unwrap());
        bus.publish(&Ping::with_key(1), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(recorder.count(), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_is_by_identity() {
        let bus = fast_bus();
        let kept = Recorder::<Ping>::new();
        let removed = Recorder::<Ping>::new();
        let removed_ref: HandlerRef<Ping> = removed.clone();
        bus.subscribe::<Ping>(kept.clone()).unwrap();
        bus.subscribe(Arc::clone(&removed_ref)).unwrap();

        // Same type, different instance: not subscribed
        let stranger: HandlerRef<Ping> = Recorder::<Ping>::new();
        assert!(!bus.unsubscribe(&stranger).unwrap());
        assert!(bus.unsubscribe(&removed_ref).unwrap());

        bus.publish(&Ping::with_key(3), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(kept.count(), 1);
        assert_eq!(removed.count(), 0);
    }

    #[tokio::test]
    async fn test_catalog_fallback() {
        let fallback = Recorder::<Ping>::new();
        let catalog = Arc::new(HandlerCatalog::new());
        let shared = Arc::clone(&fallback);
        catalog.provide::<Ping, _, _>(move || Forward(Arc::clone(&shared)));
        let bus = MessageBus::with_catalog(fast_queue(), catalog);

        bus.publish(&Ping::with_key(1), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(fallback.keys(), vec![1]);

        let subscribed = Recorder::<Ping>::new();
        bus.subscribe::<Ping>(subscribed.clone()).unwrap();
        bus.publish(&Ping::with_key(2), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(fallback.keys(), vec![1]);
        assert_eq!(subscribed.keys(), vec![2]);
    }

    #[tokio::test]
    async fn test_cancelled_publish_is_distinct_from_failure() {
        let bus = fast_bus();
        let recorder = Recorder::<Ping>::new();
        bus.subscribe::<Ping>(recorder.clone()).unwrap();

        let token = CancellationToken::new();
        token.cancel();
        let result = bus.publish(&Ping::with_key(1), &token).await;

        assert_eq!(result, Err(BusError::Cancelled));
        assert_eq!(recorder.count(), 0);
    }

    /// Catalog-built handler forwarding to a shared recorder.
    struct Forward(Arc<Recorder<Ping>>);

    #[async_trait]
    impl MessageHandler<Ping> for Forward {
        async fn handle(&self, message: &Ping, cancel: &CancellationToken) -> HandlerResult {
            self.0.handle(message, cancel).await
        }
    }
}
