use bon::Builder;
use chat_ox_common::Timestamp;
use serde::{Deserialize, Serialize};

use crate::message::{ChatMessage, MessageRole};

/// Body of the chat request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Builder)]
pub struct ChatRequest {
    #[builder(into)]
    pub message: String,
    #[builder(default)]
    pub conversation_history: Vec<HistoryEntry>,
}

/// A prior message as sent back to the server for context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntry {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: Timestamp,
}

impl From<&ChatMessage> for HistoryEntry {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
            timestamp: message.timestamp,
        }
    }
}
