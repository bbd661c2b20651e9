//! # Bus Wiring
//!
//! Composition root: the one place a `MessageBus` is constructed. Everything
//! else in the process receives it as `Arc<MessageBus>`.
//!
//! ## Wiring
//!
//! ```text
//!                    ┌─────────────────────────────────────┐
//!                    │            MessageBus               │
//!                    │  registry ── catalog (fallback)     │
//!                    └───────┬──────────────┬──────────────┘
//!                            │              │
//!   Heartbeat (queued) ──────┤              ├────── AuditRecord (direct)
//!                            ▼              ▼
//!      Metrics → Timing → Containment   Metrics → Timing
//!                            │              │
//!                            ▼              ▼
//!                   HeartbeatMonitor     AuditTrail
//!
//!   ConfigChanged (direct) ─→ no subscriber ─→ catalog ─→ ConfigChangeLogger
//! ```
//!
//! ## Shutdown
//!
//! 1. Cancel the heartbeat loop and wait for it
//! 2. Dispose the bus (bounded wait on consumers, queues dropped)

use std::sync::Arc;

use courier_bus::{
    BusError, BusResult, DispatchReport, DistributedMessageBus, ErrorContainmentBehavior,
    HandlerCatalog, HandlerRef, Message, MessageBus, TimingBehavior,
};
use courier_telemetry::{log_event, MESSAGES_ENQUEUED, MESSAGES_PUBLISHED, QUEUE_DEPTH};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::adapters::MetricsBehavior;
use crate::container::HostConfig;
use crate::handlers::{
    AuditRecord, AuditTrail, ConfigChangeLogger, ConfigChanged, Heartbeat, HeartbeatMonitor,
};
use crate::COMPONENT;

/// The host process: one bus plus the handlers subscribed to it.
pub struct HostRuntime {
    config: HostConfig,
    bus: Arc<MessageBus>,
    distributed: DistributedMessageBus,
    heartbeat: Arc<HeartbeatMonitor>,
    audit: Arc<AuditTrail>,
    shutdown: CancellationToken,
    heartbeat_task: Mutex<Option<JoinHandle<()>>>,
}

impl HostRuntime {
    /// Build the bus and subscribe the host's handlers.
    ///
    /// # Errors
    ///
    /// Propagates subscription failures from the bus.
    pub fn new(config: HostConfig) -> BusResult<Self> {
        let catalog = Arc::new(HandlerCatalog::new());
        catalog.provide::<ConfigChanged, _, _>(|| ConfigChangeLogger);

        let bus = Arc::new(MessageBus::with_catalog(config.queue.clone(), catalog));

        let heartbeat = Arc::new(HeartbeatMonitor::new());
        let audit = Arc::new(AuditTrail::new(config.audit_capacity));

        let heartbeat_handler: HandlerRef<Heartbeat> = heartbeat.clone();
        bus.subscribe_with(heartbeat_handler, |pipeline| {
            pipeline
                .with(MetricsBehavior)
                .with(TimingBehavior)
                .with(ErrorContainmentBehavior::swallow())
        })?;

        let audit_handler: HandlerRef<AuditRecord> = audit.clone();
        bus.subscribe_with(audit_handler, |pipeline| {
            pipeline.with(MetricsBehavior).with(TimingBehavior)
        })?;

        log_event!(
            info,
            COMPONENT,
            "Bus wired",
            message_types = bus.registry().message_types().len(),
            handlers = bus.registry().total_handlers()
        );

        Ok(Self {
            distributed: DistributedMessageBus::json(Arc::clone(&bus)),
            config,
            bus,
            heartbeat,
            audit,
            shutdown: CancellationToken::new(),
            heartbeat_task: Mutex::new(None),
        })
    }

    /// Start queued delivery and the heartbeat loop.
    ///
    /// # Errors
    ///
    /// Propagates `MessageBus::start` failures.
    pub fn start(&self) -> BusResult<()> {
        self.bus.start()?;

        let mut task = self.heartbeat_task.lock();
        if task.is_none() {
            *task = Some(tokio::spawn(heartbeat_loop(
                Arc::clone(&self.bus),
                self.config.heartbeat_interval,
                self.shutdown.child_token(),
            )));
        }

        log_event!(
            info,
            COMPONENT,
            "Host started",
            heartbeat_ms = self.config.heartbeat_interval.as_millis() as u64
        );
        Ok(())
    }

    /// Direct publish, counted in `courier_bus_messages_published_total`.
    ///
    /// # Errors
    ///
    /// Same as `MessageBus::publish`.
    pub async fn publish<M: Message>(&self, message: &M) -> BusResult<DispatchReport> {
        let report = self.bus.publish(message, &self.shutdown).await?;
        MESSAGES_PUBLISHED.inc();
        Ok(report)
    }

    /// Queued send, counted in `courier_bus_messages_enqueued_total`.
    ///
    /// # Errors
    ///
    /// Same as `MessageBus::send`.
    pub fn send<M: Message>(&self, message: M) -> BusResult<()> {
        send_counted(&self.bus, message)
    }

    /// Stop the heartbeat and dispose the bus. Idempotent.
    pub async fn shutdown(&self) {
        log_event!(info, COMPONENT, "Initiating graceful shutdown...");
        self.shutdown.cancel();

        let task = self.heartbeat_task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                log_event!(error, COMPONENT, "Heartbeat task failed", error = %e);
            }
        }

        self.bus.dispose().await;
        QUEUE_DEPTH.set(0.0);
        log_event!(info, COMPONENT, "Shutdown complete");
    }

    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }

    pub fn distributed(&self) -> &DistributedMessageBus {
        &self.distributed
    }

    pub fn heartbeat_monitor(&self) -> &Arc<HeartbeatMonitor> {
        &self.heartbeat
    }

    pub fn audit_trail(&self) -> &Arc<AuditTrail> {
        &self.audit
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }
}

fn send_counted<M: Message>(bus: &MessageBus, message: M) -> BusResult<()> {
    bus.send(message)?;
    MESSAGES_ENQUEUED.inc();
    QUEUE_DEPTH.set(bus.queue().total_pending() as f64);
    Ok(())
}

async fn heartbeat_loop(
    bus: Arc<MessageBus>,
    every: std::time::Duration,
    cancel: CancellationToken,
) {
    let mut sent: u64 = 0;
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match send_counted(&bus, Heartbeat::new(sent + 1)) {
            Ok(()) => sent += 1,
            Err(BusError::Disposed) => break,
            Err(e) => log_event!(error, COMPONENT, "Failed to send heartbeat", error = %e),
        }
    }

    log_event!(
        debug,
        COMPONENT,
        "Heartbeat loop stopped",
        sent
    );
}
