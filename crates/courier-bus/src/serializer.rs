//! # Message Serialization
//!
//! Pluggable text encoding used by the distributed facade. The in-process
//! core never serializes anything.

use crate::error::{BusError, BusResult};
use crate::message::Message;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Strategy turning messages into text and back.
pub trait MessageSerializer: Send + Sync {
    /// Encode `message` as text.
    ///
    /// # Errors
    ///
    /// `BusError::Serialization` if the message cannot be encoded.
    fn serialize<M: Message + Serialize>(&self, message: &M) -> BusResult<String>;

    /// Decode a message of type `M` from `text`.
    ///
    /// # Errors
    ///
    /// `BusError::Serialization` if `text` is not a valid `M`.
    fn deserialize<M: Message + DeserializeOwned>(&self, text: &str) -> BusResult<M>;
}

/// JSON via `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer {
    pretty: bool,
}

impl JsonSerializer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Indented output.
    #[must_use]
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl MessageSerializer for JsonSerializer {
    fn serialize<M: Message + Serialize>(&self, message: &M) -> BusResult<String> {
        let encoded = if self.pretty {
            serde_json::to_string_pretty(message)
        } else {
            serde_json::to_string(message)
        };
        encoded.map_err(|e| serialization_error::<M>(&e))
    }

    fn deserialize<M: Message + DeserializeOwned>(&self, text: &str) -> BusResult<M> {
        serde_json::from_str(text).map_err(|e| serialization_error::<M>(&e))
    }
}

fn serialization_error<M: Message>(e: &serde_json::Error) -> BusError {
    BusError::Serialization {
        message_type: std::any::type_name::<M>(),
        reason: e.to_string(),
    }
}
