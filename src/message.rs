//! Typed representations of inbound VK callback events.
//!
//! The webhook boundary hands a raw `type` tag and an `object` payload to
//! [`InboundEvent::normalize`], which produces either the confirmation
//! challenge marker or a [`NewMessage`]. Unknown payload fields are ignored:
//! VK adds optional fields over time and deliveries must keep normalizing.

use serde::Deserialize;
use serde_json::Value;

use crate::base::types::EventError;

/// Event type tag for a new conversation message.
pub const TYPE_MESSAGE_NEW: &str = "message_new";

/// Event type tag for the callback confirmation challenge.
pub const TYPE_CONFIRMATION: &str = "confirmation";

/// An inbound callback event after normalization.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    /// The platform is verifying the callback endpoint; the response body
    /// must be the configured confirmation code.
    Confirmation,
    /// A new message in some conversation.
    NewMessage(NewMessage),
}

impl InboundEvent {
    /// Constructs a typed event from the raw `type` tag and `object` payload.
    pub fn normalize(type_tag: &str, payload: &Value) -> Result<Self, EventError> {
        match type_tag {
            TYPE_CONFIRMATION => Ok(Self::Confirmation),
            TYPE_MESSAGE_NEW => {
                let message = NewMessage::from_payload(payload)?;
                Ok(Self::NewMessage(message))
            }
            other => Err(EventError::UnrecognizedEventType(other.to_string())),
        }
    }
}

/// An opaque attachment descriptor; only the type tag is inspected, and only
/// for diagnostics.
#[derive(Debug, Clone, Deserialize)]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: String,
}

/// A structured system action inside a conversation (member joined, chat
/// renamed, and so on).
#[derive(Debug, Clone, Deserialize)]
pub struct MessageAction {
    #[serde(rename = "type")]
    pub kind: String,
    pub member_id: Option<i64>,
}

/// A new conversation message.
///
/// `text` is case-folded to lowercase at construction; trigger matching never
/// sees the original casing. `raw_text` stays `None` until the runtime has
/// confirmed the bot was mentioned, and handlers treat `None` as "not
/// addressed to the bot".
#[derive(Debug, Clone, Deserialize)]
pub struct NewMessage {
    pub from_id: i64,
    pub peer_id: i64,
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub action: Option<MessageAction>,
    #[serde(skip)]
    pub raw_text: Option<String>,
}

impl NewMessage {
    fn from_payload(payload: &Value) -> Result<Self, EventError> {
        let mut message: NewMessage =
            serde_json::from_value(payload.clone()).map_err(|e| EventError::MalformedPayload(e.to_string()))?;
        message.text = message.text.to_lowercase();
        Ok(message)
    }

    /// True when the message belongs to a group conversation rather than a
    /// one-to-one chat.
    pub fn is_group_chat(&self, threshold: i64) -> bool {
        self.peer_id >= threshold
    }

    /// Human-readable content for log records: the text when present,
    /// otherwise the system action type, otherwise the attachment types.
    /// Never used for trigger matching.
    pub fn display_content(&self) -> String {
        if !self.text.is_empty() {
            return self.text.clone();
        }

        if let Some(action) = &self.action {
            return action.kind.clone();
        }

        self.attachments.iter().map(|a| a.kind.as_str()).collect::<Vec<_>>().join(", ")
    }
}

impl std::fmt::Display for NewMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} --- user {} says: {}", self.peer_id, self.from_id, self.display_content())
    }
}
