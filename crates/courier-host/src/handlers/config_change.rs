//! Catalog-provided handler for `ConfigChanged`.
//!
//! Built fresh by the handler catalog for every publish, since nothing
//! subscribes to configuration changes directly.

use async_trait::async_trait;
use courier_bus::{CancellationToken, HandlerResult, Message, MessageHandler};
use courier_telemetry::log_event;

use super::messages::ConfigChanged;
use crate::COMPONENT;

#[derive(Debug, Default)]
pub struct ConfigChangeLogger;

#[async_trait]
impl MessageHandler<ConfigChanged> for ConfigChangeLogger {
    async fn handle(&self, message: &ConfigChanged, _cancel: &CancellationToken) -> HandlerResult {
        log_event!(
            info,
            COMPONENT,
            "Configuration changed",
            key = %message.key,
            value = %message.value,
            message_id = %message.id()
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "config-change-logger"
    }
}
