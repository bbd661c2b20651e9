//! # Courier Bus - In-Process Messaging
//!
//! Typed publish/subscribe between components that hold no references to
//! each other.
//!
//! ## Dispatch Paths
//!
//! ```text
//!                        ┌──────────────────┐
//!   publish(&msg) ──────→│    Dispatcher    │──→ join_all ─┬→ handler A
//!                        │ (fan-out, waits) │              ├→ pipeline ─→ handler B
//!                        └────────▲─────────┘              └→ handler C
//!                                 │
//!                        ┌────────┴─────────┐
//!   send(msg) ──────────→│   MessageQueue   │  one FIFO + one consumer
//!   (returns at once)    │  (per-type FIFO) │  task per message type
//!                        └──────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - **Fan-out:** every handler registered for a type sees each published
//!   message exactly once.
//! - **Isolation:** a handler that fails or panics, synchronously or after an
//!   await, is logged and counted; it never fails `publish` and never stops
//!   a consumer loop.
//! - **FIFO:** queued messages of one type are delivered in enqueue order.
//!   Nothing is promised across types.
//! - **Cooperative cancellation:** checked before each handler starts and at
//!   each consumer poll; running handlers are never aborted.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod behaviors;
pub mod bus;
pub mod catalog;
pub mod config;
pub mod dispatcher;
pub mod distributed;
pub mod error;
pub mod handler;
pub mod message;
pub mod pipeline;
pub mod queue;
pub mod registry;
pub mod serializer;

pub use behaviors::{ErrorContainmentBehavior, TimingBehavior};
pub use bus::MessageBus;
pub use catalog::HandlerCatalog;
pub use config::QueueConfig;
pub use dispatcher::{DispatchReport, Dispatcher};
pub use distributed::DistributedMessageBus;
pub use error::{BusError, BusResult, HandlerError, HandlerResult};
pub use handler::{handler_fn, invoke_isolated, FnHandler, HandlerOutcome, MessageHandler};
pub use message::{Message, MessageHeader, MessageType};
pub use pipeline::{Behavior, Next, Pipeline, PipelineBuilder};
pub use queue::{MessageQueue, QueueState};
pub use registry::{HandlerRef, HandlerRegistry};
pub use serializer::{JsonSerializer, MessageSerializer};

pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;

/// Component name used in structured logs.
pub const COMPONENT: &str = "courier-bus";
