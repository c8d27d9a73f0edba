//! Wire-level message types.
//!
//! Outbound frames are `{"recipient_id": .., "type": .., "payload": ..}`.
//! Inbound frames are `{"type": .., "payload": ..}` and only `typing` is
//! understood today; everything else survives decoding as
//! [`Inbound::Unknown`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::UserId;

/// Outbound event, tagged by its wire `type`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Event {
    /// A chat message was created in a conversation the recipient belongs to.
    NewMessage(ChatMessage),
    /// A message the recipient sent reached its counterpart.
    MessageDelivered(Receipt),
    /// A message the recipient sent was read.
    MessageRead(Receipt),
    /// Someone started or stopped typing in a shared conversation.
    Typing(TypingNotice),
}

impl Event {
    /// Wire name of this event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NewMessage(_) => "new_message",
            Self::MessageDelivered(_) => "message_delivered",
            Self::MessageRead(_) => "message_read",
            Self::Typing(_) => "typing",
        }
    }
}

/// Payload of `new_message`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message id assigned by the host application.
    pub id: i64,
    /// Conversation the message belongs to.
    pub conversation_id: i64,
    /// Author.
    pub sender_id: UserId,
    /// Message body.
    pub content: String,
    /// Creation time, RFC 3339 on the wire.
    pub created_at: DateTime<Utc>,
}

/// Payload of `message_delivered` and `message_read`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Message the receipt is about.
    pub message_id: i64,
    /// Conversation of that message.
    pub conversation_id: i64,
    /// The user whose client produced the receipt.
    pub user_id: UserId,
    /// When the message was delivered or read.
    pub at: DateTime<Utc>,
}

/// Payload of outbound `typing`. `user_id` is always the sender.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingNotice {
    /// Conversation being typed in.
    pub conversation_id: i64,
    /// Who is typing.
    pub user_id: UserId,
    /// `false` once they stop.
    pub is_typing: bool,
}

/// A routed message: one event addressed to one user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// User the message is addressed to.
    pub recipient_id: UserId,
    /// Event carried, flattened into `type` and `payload`.
    #[serde(flatten)]
    pub event: Event,
}

impl Message {
    /// Address `event` to `recipient_id`.
    pub fn new(recipient_id: UserId, event: Event) -> Self {
        Self {
            recipient_id,
            event,
        }
    }

    /// Wire name of the carried event.
    pub fn kind(&self) -> &'static str {
        self.event.kind()
    }
}

/// Payload of inbound `typing`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingRequest {
    /// Conversation being typed in.
    pub conversation_id: i64,
    /// User to notify.
    pub recipient_id: UserId,
    /// `false` once the sender stops.
    pub is_typing: bool,
}

/// A decoded inbound frame.
#[derive(Clone, Debug, PartialEq)]
pub enum Inbound {
    /// The client is typing (or stopped) in a conversation.
    Typing(TypingRequest),
    /// A kind this server does not understand yet.
    Unknown {
        /// The `type` string as sent.
        kind: String,
        /// The untouched payload (`null` when absent).
        payload: Value,
    },
}

impl Inbound {
    /// Wire name of this frame.
    pub fn kind(&self) -> &str {
        match self {
            Self::Typing(_) => "typing",
            Self::Unknown { kind, .. } => kind,
        }
    }
}
