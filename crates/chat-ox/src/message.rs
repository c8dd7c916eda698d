use chat_ox_common::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{AsRefStr, Display};
use uuid::Uuid;

/// Identifier of a chat message.
///
/// Backed by a UUIDv7, so ids are unique and sort by creation time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One entry of the visible conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub role: MessageRole,
    /// Grows while the assistant reply is streaming, fixed afterwards.
    pub content: String,
    pub timestamp: Timestamp,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role: MessageRole::User,
            content: content.into(),
            timestamp: Timestamp::now(),
        }
    }

    /// Empty assistant message that streamed text is appended to.
    #[must_use]
    pub fn assistant_placeholder() -> Self {
        Self {
            id: MessageId::new(),
            role: MessageRole::Assistant,
            content: String::new(),
            timestamp: Timestamp::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let first = MessageId::new();
        let second = MessageId::new();
        assert_ne!(first, second);
        assert_eq!(first.as_str().len(), 36);
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_value(MessageRole::Assistant).unwrap(), "assistant");
        assert_eq!(MessageRole::User.to_string(), "user");
    }

    #[test]
    fn placeholder_starts_empty() {
        let msg = ChatMessage::assistant_placeholder();
        assert!(msg.is_empty());
        assert_eq!(msg.role, MessageRole::Assistant);
    }
}
