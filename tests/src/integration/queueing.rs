//! # Queued Delivery
//!
//! - Per-type FIFO, both through consumers and through `receive`
//! - Types never block each other, even with concurrent producers
//! - A restart never puts two consumers on one FIFO
//! - Messages sent before `start` survive until a consumer runs

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use courier_bus::{
        BusError, CancellationToken, HandlerResult, MessageBus, MessageHandler, QueueState,
    };
    use parking_lot::Mutex;

    use crate::fixtures::{
        fast_bus, fast_queue, wait_for, Fault, Faulty, Invoice, Keyed, Order, Ping, Recorder,
    };

    #[tokio::test]
    async fn test_single_type_fifo_through_consumer() {
        let bus = fast_bus();
        let recorder = Recorder::<Ping>::new();
        bus.subscribe::<Ping>(recorder.clone()).unwrap();

        for key in 1..=3 {
            bus.send(Ping::with_key(key)).unwrap();
        }
        wait_for(|| recorder.count() == 3).await;

        assert_eq!(recorder.keys(), vec![1, 2, 3]);
        bus.dispose().await;
    }

    #[tokio::test]
    async fn test_single_type_fifo_through_receive() {
        let bus = MessageBus::new(fast_queue().with_auto_start(false));
        for key in 1..=3 {
            bus.send(Ping::with_key(key)).unwrap();
        }

        let cancel = CancellationToken::new();
        let mut keys = Vec::new();
        for _ in 0..3 {
            keys.push(bus.receive::<Ping>(&cancel).await.unwrap().key());
        }

        assert_eq!(keys, vec![1, 2, 3]);
        assert_eq!(bus.queue().pending::<Ping>(), 0);
    }

    #[tokio::test]
    async fn test_receive_waits_for_send() {
        let bus = Arc::new(MessageBus::new(fast_queue().with_auto_start(false)));
        let cancel = CancellationToken::new();

        let receiver = {
            let bus = Arc::clone(&bus);
            let cancel = cancel.clone();
            tokio::spawn(async move { bus.receive::<Order>(&cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        bus.send(Order::with_key(42)).unwrap();

        let order = tokio::time::timeout(Duration::from_secs(2), receiver)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(order.key(), 42);
    }

    #[tokio::test]
    async fn test_receive_honours_cancellation() {
        let bus = MessageBus::new(fast_queue().with_auto_start(false));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = bus.receive::<Order>(&cancel).await;
        assert_eq!(result.unwrap_err(), BusError::Cancelled);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_producers_keep_per_type_order() {
        let bus = Arc::new(fast_bus());
        let orders = Recorder::<Order>::new();
        let invoices = Recorder::<Invoice>::new();
        bus.subscribe::<Order>(orders.clone()).unwrap();
        bus.subscribe::<Invoice>(invoices.clone()).unwrap();

        let order_producer = {
            let bus = Arc::clone(&bus);
            tokio::spawn(async move {
                for key in 1..=200 {
                    bus.send(Order::with_key(key)).unwrap();
                    if key % 16 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            })
        };
        let invoice_producer = {
            let bus = Arc::clone(&bus);
            tokio::spawn(async move {
                for key in 1..=200 {
                    bus.send(Invoice::with_key(1_000 + key)).unwrap();
                    if key % 7 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            })
        };
        order_producer.await.unwrap();
        invoice_producer.await.unwrap();

        wait_for(|| orders.count() == 200 && invoices.count() == 200).await;

        assert_eq!(orders.keys(), (1..=200).collect::<Vec<_>>());
        assert_eq!(invoices.keys(), (1_001..=1_200).collect::<Vec<_>>());
        assert_eq!(bus.queue().consumer_count(), 2);
        bus.dispose().await;
    }

    /// Holds key 1 for a while before recording it.
    struct SlowFirst {
        delivered: Mutex<Vec<u64>>,
    }

    #[async_trait]
    impl MessageHandler<Ping> for SlowFirst {
        async fn handle(&self, message: &Ping, _cancel: &CancellationToken) -> HandlerResult {
            if message.key() == 1 {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            self.delivered.lock().push(message.key());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_restart_during_delivery_keeps_fifo() {
        let bus = fast_bus();
        let slow = Arc::new(SlowFirst {
            delivered: Mutex::new(Vec::new()),
        });
        bus.subscribe::<Ping>(slow.clone()).unwrap();

        bus.send(Ping::with_key(1)).unwrap();
        bus.send(Ping::with_key(2)).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Key 1 is still in its handler when the queue restarts
        bus.stop();
        bus.start().unwrap();
        wait_for(|| slow.delivered.lock().len() == 2).await;

        assert_eq!(*slow.delivered.lock(), vec![1, 2]);
        bus.dispose().await;
    }

    #[tokio::test]
    async fn test_sent_before_start_delivered_after_start() {
        let bus = MessageBus::new(fast_queue().with_auto_start(false));
        let recorder = Recorder::<Order>::new();
        bus.subscribe::<Order>(recorder.clone()).unwrap();

        bus.send(Order::with_key(1)).unwrap();
        bus.send(Order::with_key(2)).unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(recorder.count(), 0);
        assert_eq!(bus.state(), QueueState::NotStarted);

        bus.start().unwrap();
        wait_for(|| recorder.count() == 2).await;

        assert_eq!(recorder.keys(), vec![1, 2]);
        bus.dispose().await;
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_stall_queue() {
        let bus = fast_bus();
        let broken = Faulty::new(Fault::PanicAfterAwait);
        let recorder = Recorder::<Ping>::new();
        bus.subscribe::<Ping>(broken.clone()).unwrap();
        bus.subscribe::<Ping>(recorder.clone()).unwrap();

        for key in 1..=3 {
            bus.send(Ping::with_key(key)).unwrap();
        }
        wait_for(|| recorder.count() == 3).await;

        assert_eq!(recorder.keys(), vec![1, 2, 3]);
        assert_eq!(broken.calls(), 3);
        bus.dispose().await;
    }

    #[tokio::test]
    async fn test_stop_keeps_backlog_for_restart() {
        let bus = fast_bus();
        let recorder = Recorder::<Ping>::new();
        bus.subscribe::<Ping>(recorder.clone()).unwrap();

        bus.stop();
        assert_eq!(bus.state(), QueueState::Stopped);
        bus.send(Ping::with_key(5)).unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(recorder.count(), 0);
        assert_eq!(bus.queue().pending::<Ping>(), 1);

        bus.start().unwrap();
        wait_for(|| recorder.count() == 1).await;
        assert_eq!(recorder.keys(), vec![5]);
        bus.dispose().await;
    }
}
