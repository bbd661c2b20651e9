//! # Bus Lifecycle
//!
//! ```text
//! NotStarted ──start──→ Running ──stop──→ Stopped
//!      │                 ▲   │              │
//!      │                 └───┼────start─────┘
//!      └────────dispose──────┴──→ Disposed (terminal)
//! ```

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use courier_bus::{BusError, CancellationToken, HandlerRef, MessageBus, QueueState};
    use courier_host::handlers::{AuditRecord, Heartbeat};
    use courier_host::{HostConfig, HostRuntime};

    use crate::fixtures::{fast_bus, fast_queue, wait_for, Keyed, Ping, Recorder};

    #[tokio::test]
    async fn test_stop_and_dispose_are_idempotent() {
        let bus = fast_bus();
        assert_eq!(bus.state(), QueueState::Running);

        bus.stop();
        bus.stop();
        assert_eq!(bus.state(), QueueState::Stopped);

        bus.dispose().await;
        bus.dispose().await;
        assert_eq!(bus.state(), QueueState::Disposed);
        assert!(bus.is_disposed());

        // Stop after dispose stays a no-op
        bus.stop();
        assert_eq!(bus.state(), QueueState::Disposed);
    }

    #[tokio::test]
    async fn test_disposed_bus_fails_fast() {
        let bus = fast_bus();
        let recorder = Recorder::<Ping>::new();
        let handler: HandlerRef<Ping> = recorder.clone();
        bus.subscribe(Arc::clone(&handler)).unwrap();
        bus.dispose().await;

        let cancel = CancellationToken::new();
        assert_eq!(
            bus.publish(&Ping::with_key(1), &cancel).await,
            Err(BusError::Disposed)
        );
        assert_eq!(bus.send(Ping::with_key(1)), Err(BusError::Disposed));
        assert_eq!(
            bus.receive::<Ping>(&cancel).await.unwrap_err(),
            BusError::Disposed
        );
        assert_eq!(bus.subscribe(Arc::clone(&handler)), Err(BusError::Disposed));
        assert_eq!(bus.unsubscribe(&handler), Err(BusError::Disposed));
        assert_eq!(bus.start(), Err(BusError::Disposed));
        assert_eq!(recorder.count(), 0);
    }

    #[tokio::test]
    async fn test_dispose_drops_pending_and_subscriptions() {
        let bus = MessageBus::new(fast_queue().with_auto_start(false));
        let recorder = Recorder::<Ping>::new();
        bus.subscribe::<Ping>(recorder.clone()).unwrap();
        bus.send(Ping::with_key(1)).unwrap();
        bus.send(Ping::with_key(2)).unwrap();

        bus.dispose().await;

        assert_eq!(bus.queue().total_pending(), 0);
        assert_eq!(bus.registry().total_handlers(), 0);
        assert_eq!(recorder.count(), 0);
    }

    #[tokio::test]
    async fn test_dispose_interrupts_blocked_receive() {
        let bus = Arc::new(MessageBus::new(fast_queue().with_auto_start(false)));
        let receiver = {
            let bus = Arc::clone(&bus);
            tokio::spawn(async move { bus.receive::<Ping>(&CancellationToken::new()).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        bus.dispose().await;

        let result = tokio::time::timeout(Duration::from_secs(2), receiver)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.unwrap_err(), BusError::Disposed);
    }

    #[tokio::test]
    async fn test_dispose_waits_for_in_flight_delivery() {
        let bus = fast_bus();
        let recorder = Recorder::<Ping>::new();
        bus.subscribe::<Ping>(recorder.clone()).unwrap();

        bus.send(Ping::with_key(1)).unwrap();
        wait_for(|| recorder.count() == 1).await;
        bus.dispose().await;

        assert_eq!(bus.queue().consumer_count(), 0);
    }

    fn host_config() -> HostConfig {
        HostConfig {
            queue: fast_queue(),
            heartbeat_interval: Duration::from_millis(10),
            audit_capacity: 4,
            ..HostConfig::default()
        }
    }

    #[tokio::test]
    async fn test_host_start_delivers_heartbeats_then_shuts_down() {
        let runtime = HostRuntime::new(host_config()).unwrap();
        runtime.start().unwrap();

        let monitor = Arc::clone(runtime.heartbeat_monitor());
        wait_for(|| monitor.received() >= 2).await;
        runtime.shutdown().await;

        assert_eq!(runtime.bus().state(), QueueState::Disposed);
        assert_eq!(runtime.send(Heartbeat::new(99)), Err(BusError::Disposed));
        assert!(monitor.last_sequence() >= 2);
    }

    #[tokio::test]
    async fn test_host_audit_trail_is_bounded() {
        let runtime = HostRuntime::new(host_config()).unwrap();

        for n in 0..6 {
            runtime
                .publish(&AuditRecord::new("ops", format!("action-{n}")))
                .await
                .unwrap();
        }

        let actions: Vec<String> = runtime
            .audit_trail()
            .snapshot()
            .into_iter()
            .map(|record| record.action)
            .collect();
        assert_eq!(actions, vec!["action-2", "action-3", "action-4", "action-5"]);
        runtime.shutdown().await;
    }
}
