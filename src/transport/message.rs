use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::error::Result;

/// Outbound messages the client itself produces.
///
/// Serialized as `{"type": ..., "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientMessage {
    #[serde(rename = "auth")]
    Auth {
        token: String,
        #[serde(rename = "userId", skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
    },
    #[serde(rename = "subscribe")]
    Subscribe { channel: String },
    #[serde(rename = "unsubscribe")]
    Unsubscribe { channel: String },
    #[serde(rename = "heartbeat")]
    Heartbeat { timestamp: i64 },
}

impl ClientMessage {
    pub fn heartbeat_now() -> Self {
        ClientMessage::Heartbeat {
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Envelope for every server-pushed message.
///
/// `type` selects the dispatch handler, `channel` additionally fans out to
/// `channel:<id>` listeners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

impl InboundMessage {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Parses a frame and also returns it untouched as JSON, unknown
    /// top-level fields included.
    pub fn parse_with_envelope(text: &str) -> Result<(Self, Value)> {
        let envelope: Value = serde_json::from_str(text)?;
        let message = Self::deserialize(&envelope)?;
        Ok((message, envelope))
    }

    pub fn message_kind(&self) -> MessageKind {
        MessageKind::from(self.kind.as_str())
    }
}

/// Inbound message types the client knows how to handle itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    PaymentStatus,
    TransactionUpdate,
    SystemNotification,
    UserMessage,
    Heartbeat,
    Other(String),
}

impl From<&str> for MessageKind {
    fn from(kind: &str) -> Self {
        match kind {
            "payment_status" => MessageKind::PaymentStatus,
            "transaction_update" => MessageKind::TransactionUpdate,
            "system_notification" => MessageKind::SystemNotification,
            "user_message" => MessageKind::UserMessage,
            "heartbeat" => MessageKind::Heartbeat,
            other => MessageKind::Other(other.to_string()),
        }
    }
}
