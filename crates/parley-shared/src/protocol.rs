use serde::{Deserialize, Serialize};

use crate::message::Message;
use crate::types::{MessageId, UserId};

/// Frames a client may send over the push channel.
///
/// Anything carrying an unrecognised `event` tag decodes to
/// [`InboundEvent::Unknown`]; frames that are not JSON at all, or that miss
/// required fields, fail to parse. Both are dropped by the hub.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum InboundEvent {
    /// Associates the connection with a user. Must come first.
    Auth {
        #[serde(rename = "userId")]
        user_id: UserId,
    },

    /// Typing indicator, relayed to the user's other sessions.
    Typing {
        #[serde(rename = "isTyping")]
        is_typing: bool,
    },

    #[serde(other)]
    Unknown,
}

impl InboundEvent {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Frames the hub pushes to authenticated connections, encoded as
/// `{"event": <name>, "data": <payload>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum OutboundEvent {
    /// A message was created or any of its fields changed.
    MessageUpdate(Message),

    /// A message was soft-deleted.
    MessageDelete { id: MessageId },

    Typing {
        #[serde(rename = "userId")]
        user_id: UserId,
        #[serde(rename = "isTyping")]
        is_typing: bool,
    },
}

impl OutboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::MessageUpdate(_) => "messageUpdate",
            Self::MessageDelete { .. } => "messageDelete",
            Self::Typing { .. } => "typing",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
