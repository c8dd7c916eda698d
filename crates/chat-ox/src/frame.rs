use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A document the assistant consulted for its answer.
///
/// The backend sends free-form objects; the common fields are lifted out and
/// everything else is kept in `ext`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Source {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(flatten)]
    pub ext: BTreeMap<String, Value>,
}

/// One line of the chat response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamFrame {
    /// Documents backing the reply. Metadata, not rendered inline.
    Sources {
        #[serde(default)]
        sources: Vec<Source>,
    },
    /// Text to append to the reply.
    Chunk { text: String },
    /// The server gave up on this reply.
    Error { error: String },
    /// A frame type this client does not know about.
    #[serde(other)]
    Unknown,
}

impl StreamFrame {
    pub fn chunk(text: impl Into<String>) -> Self {
        Self::Chunk { text: text.into() }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self::Error {
            error: error.into(),
        }
    }

    /// Returns the wire name of this frame type.
    pub fn frame_type(&self) -> &'static str {
        match self {
            StreamFrame::Sources { .. } => "sources",
            StreamFrame::Chunk { .. } => "chunk",
            StreamFrame::Error { .. } => "error",
            StreamFrame::Unknown => "unknown",
        }
    }
}
