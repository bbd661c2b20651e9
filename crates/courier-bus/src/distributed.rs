//! # Distributed Facade
//!
//! `DistributedMessageBus` has the surface a cross-process bus would have,
//! but there is no transport behind it: every operation runs on the local
//! [`MessageBus`]. The serializer is exposed through `encode` and
//! `publish_encoded`, which is where a transport would hand over payloads.

use crate::bus::MessageBus;
use crate::dispatcher::DispatchReport;
use crate::error::BusResult;
use crate::message::{Message, MessageType};
use crate::registry::HandlerRef;
use crate::serializer::{JsonSerializer, MessageSerializer};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// In-process bus with a serialization boundary.
pub struct DistributedMessageBus<S: MessageSerializer = JsonSerializer> {
    inner: Arc<MessageBus>,
    serializer: S,
}

impl DistributedMessageBus<JsonSerializer> {
    /// Facade over `inner` using compact JSON.
    #[must_use]
    pub fn json(inner: Arc<MessageBus>) -> Self {
        Self::new(inner, JsonSerializer::new())
    }
}

impl<S: MessageSerializer> DistributedMessageBus<S> {
    #[must_use]
    pub fn new(inner: Arc<MessageBus>, serializer: S) -> Self {
        Self { inner, serializer }
    }

    /// # Errors
    ///
    /// Same as [`MessageBus::subscribe`].
    pub fn subscribe<M: Message>(&self, handler: HandlerRef<M>) -> BusResult<bool> {
        self.inner.subscribe(handler)
    }

    /// # Errors
    ///
    /// Same as [`MessageBus::unsubscribe`].
    pub fn unsubscribe<M: Message>(&self, handler: &HandlerRef<M>) -> BusResult<bool> {
        self.inner.unsubscribe(handler)
    }

    /// # Errors
    ///
    /// Same as [`MessageBus::publish`].
    pub async fn publish<M: Message>(
        &self,
        message: &M,
        cancel: &CancellationToken,
    ) -> BusResult<DispatchReport> {
        self.inner.publish(message, cancel).await
    }

    /// Encode `message` the way it would travel between processes.
    ///
    /// # Errors
    ///
    /// `BusError::Serialization` if encoding fails.
    pub fn encode<M: Message + Serialize>(&self, message: &M) -> BusResult<String> {
        let payload = self.serializer.serialize(message)?;
        debug!(
            message_type = %MessageType::of::<M>(),
            message_id = %message.id(),
            bytes = payload.len(),
            "Message encoded"
        );
        Ok(payload)
    }

    /// Decode `payload` as `M` and publish it locally.
    ///
    /// # Errors
    ///
    /// `BusError::Serialization` if `payload` is not an `M`, otherwise the
    /// same as [`MessageBus::publish`].
    pub async fn publish_encoded<M: Message + DeserializeOwned>(
        &self,
        payload: &str,
        cancel: &CancellationToken,
    ) -> BusResult<DispatchReport> {
        let message: M = self.serializer.deserialize(payload)?;
        debug!(
            message_type = %MessageType::of::<M>(),
            message_id = %message.id(),
            "Encoded message decoded"
        );
        self.inner.publish(&message, cancel).await
    }

    /// The local bus everything is delegated to.
    #[must_use]
    pub fn inner(&self) -> &Arc<MessageBus> {
        &self.inner
    }

    #[must_use]
    pub fn serializer(&self) -> &S {
        &self.serializer
    }
}
