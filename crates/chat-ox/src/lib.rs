#![cfg_attr(not(test), deny(unsafe_code))]
#![warn(
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::missing_docs_in_private_items
)]

//! Client for the embedded chat assistant.
//!
//! The assistant answers with a newline-delimited JSON body. [`ChatSession`]
//! posts the user's message, reads the body as it arrives and applies each
//! frame to a [`Conversation`], so the reply grows on screen while it streams.

pub mod capability;
pub mod conversation;
pub mod error;
pub mod frame;
mod internal;
pub mod message;
pub mod request;
pub mod session;

pub use capability::{Capabilities, CapabilityError, SpeechInput};
pub use conversation::{
    Conversation, Exchange, ExchangeSink, ExchangeState, FAILURE_MESSAGE, Outgoing,
    SharedConversation,
};
pub use error::{ChatError, ConversationError};
pub use frame::{Source, StreamFrame};
pub use message::{ChatMessage, MessageId, MessageRole};
pub use request::{ChatRequest, HistoryEntry};
pub use session::{CLOSED_REASON, ChatSession, Reply, Transport};

// Re-export types from chat-ox-common for convenience
pub use chat_ox_common::{
    ByteStream, CancellationToken, CommonRequestError, ConsumeOutcome, FrameCodec, FrameHandler,
    NdjsonParser, Timestamp, TrailingLine, consume,
};

use async_trait::async_trait;
use bon::Builder;
use core::fmt;
use futures_util::stream::BoxStream;
use std::time::Duration;

use crate::internal::ChatRequestHelper;

const DEFAULT_ENDPOINT: &str = "chat/stream";

/// HTTP transport for the chat assistant backend.
#[derive(Clone, Builder)]
pub struct ChatAssistant {
    #[builder(into)]
    pub(crate) base_url: String,
    #[builder(default = DEFAULT_ENDPOINT.to_string(), into)]
    pub(crate) endpoint: String,
    #[builder(into)]
    pub(crate) api_key: Option<String>,
    /// Overall deadline for one request, streamed body included.
    pub(crate) request_timeout: Option<Duration>,
    #[builder(default)]
    pub(crate) client: reqwest::Client,
}

impl ChatAssistant {
    /// Create a client for the backend at `base_url` with default settings.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::builder().base_url(base_url).build()
    }

    /// Read `CHAT_OX_BASE_URL`, and optionally `CHAT_OX_API_KEY`,
    /// `CHAT_OX_ENDPOINT` and `CHAT_OX_TIMEOUT_SECS`.
    pub fn load_from_env() -> Result<Self, ChatError> {
        let base_url = std::env::var("CHAT_OX_BASE_URL").map_err(|_| ChatError::MissingBaseUrl)?;
        let endpoint = std::env::var("CHAT_OX_ENDPOINT").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
        let api_key = std::env::var("CHAT_OX_API_KEY").ok();
        let request_timeout = match std::env::var("CHAT_OX_TIMEOUT_SECS") {
            Ok(raw) => Some(Duration::from_secs(raw.trim().parse().map_err(|e| {
                ChatError::InvalidConfig(format!("CHAT_OX_TIMEOUT_SECS={raw}: {e}"))
            })?)),
            Err(_) => None,
        };

        Ok(Self::builder()
            .base_url(base_url)
            .endpoint(endpoint)
            .maybe_api_key(api_key)
            .maybe_request_timeout(request_timeout)
            .build())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }

    /// Create request helper for internal use
    fn request_helper(&self) -> ChatRequestHelper {
        ChatRequestHelper::new(
            self.client.clone(),
            &self.base_url,
            &self.endpoint,
            self.api_key.as_deref(),
            self.request_timeout,
        )
    }

    /// Post a chat request and decode its body into frames.
    pub fn stream(&self, request: &ChatRequest) -> BoxStream<'static, Result<StreamFrame, ChatError>> {
        self.request_helper().stream_chat_request(request)
    }
}

#[async_trait]
impl Transport for ChatAssistant {
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream, CommonRequestError> {
        self.request_helper().open_chat_stream(request).await
    }
}

impl fmt::Debug for ChatAssistant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatAssistant")
            .field("base_url", &self.base_url)
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}
