//! Wire envelope and the payloads carried inside it.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::HubError;

/// Inbound chat event type.
pub const EVENT_SEND_MESSAGE: &str = "send_message";
/// Outbound chat event type.
pub const EVENT_NEW_MESSAGE: &str = "new_message";

/// A typed message unit: `{"type": "...", "payload": ...}`.
///
/// The payload stays opaque until a handler for `type` decodes it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    payload: Value,
}

impl Envelope {
    /// Build an envelope from a serializable payload.
    pub fn new(event_type: impl Into<String>, payload: &impl Serialize) -> Result<Self, HubError> {
        Ok(Self {
            event_type: event_type.into(),
            payload: serde_json::to_value(payload).map_err(HubError::Encode)?,
        })
    }

    /// Parse one inbound data frame.
    pub fn decode(frame: &[u8]) -> Result<Self, HubError> {
        serde_json::from_slice(frame).map_err(HubError::Decode)
    }

    /// Serialize for the wire.
    pub fn encode(&self) -> Result<String, HubError> {
        serde_json::to_string(self).map_err(HubError::Encode)
    }

    /// The event type tag.
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// The raw payload.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Decode the payload as `T`.
    pub fn decode_payload<T: DeserializeOwned>(&self) -> Result<T, HubError> {
        T::deserialize(&self.payload).map_err(HubError::BadPayload)
    }
}

/// Payload of `send_message`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatMessage {
    /// Display name the sender chose.
    pub from: String,
    /// Message body.
    pub message: String,
}

/// Payload of `new_message`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastMessage {
    /// Copied from the inbound [`ChatMessage`].
    pub from: String,
    /// Copied from the inbound [`ChatMessage`].
    pub message: String,
    /// When the hub accepted the message (RFC 3339 on the wire).
    pub sent: DateTime<Utc>,
}

impl BroadcastMessage {
    /// Stamp a chat message with the current time.
    pub fn from_chat(chat: ChatMessage) -> Self {
        Self {
            from: chat.from,
            message: chat.message,
            sent: Utc::now(),
        }
    }
}
