//! Conversation state and the reducer that applies stream frames to it.
//!
//! Every user send opens one *exchange*: the user message plus an assistant
//! placeholder whose id is fixed at send time. Frames are always applied by
//! that id, so a reply can never leak into another message.
//!
//! ```text
//!            begin_send        first chunk          on_done
//!   (idle) ───────────▶ Sending ───────────▶ Streaming ─────────▶ Completed
//!                          │                     │
//!                          └──── fail / error ───┴──────────────▶ Failed
//! ```

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use chat_ox_common::{CommonRequestError, FrameHandler};
use strum::Display;

use crate::{
    error::ConversationError,
    frame::{Source, StreamFrame},
    message::{ChatMessage, MessageId, MessageRole},
    request::{ChatRequest, HistoryEntry},
};

/// Shown in place of a reply that failed before any text arrived.
pub const FAILURE_MESSAGE: &str = "Sorry, something went wrong while generating a response. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ExchangeState {
    /// Request sent, no byte of the response yet.
    Sending,
    /// Response body is arriving.
    Streaming,
    Completed,
    Failed,
}

impl ExchangeState {
    /// Still accepting frames.
    pub fn is_open(self) -> bool {
        matches!(self, Self::Sending | Self::Streaming)
    }
}

/// Bookkeeping for one assistant reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    state: ExchangeState,
    prompt_id: MessageId,
    sources: Vec<Source>,
    error: Option<String>,
}

impl Exchange {
    fn new(prompt_id: MessageId) -> Self {
        Self {
            state: ExchangeState::Sending,
            prompt_id,
            sources: Vec::new(),
            error: None,
        }
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    /// Id of the user message this reply answers.
    pub fn prompt_id(&self) -> &MessageId {
        &self.prompt_id
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Why the exchange failed, as reported by the server or the transport.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// What [`Conversation::begin_send`] hands back to the caller.
#[derive(Debug, Clone)]
pub struct Outgoing {
    /// Id of the assistant placeholder the reply streams into.
    pub reply_id: MessageId,
    pub request: ChatRequest,
}

/// Messages of one chat plus the state of every exchange in it.
#[derive(Debug, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    exchanges: HashMap<MessageId, Exchange>,
}

impl Conversation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn message(&self, id: &MessageId) -> Option<&ChatMessage> {
        self.messages.iter().rev().find(|m| &m.id == id)
    }

    pub fn exchange(&self, reply_id: &MessageId) -> Option<&Exchange> {
        self.exchanges.get(reply_id)
    }

    /// True while a request is out and no response byte has arrived.
    pub fn is_loading(&self) -> bool {
        self.exchanges
            .values()
            .any(|e| e.state == ExchangeState::Sending)
    }

    /// Number of replies still accepting frames.
    pub fn in_flight(&self) -> usize {
        self.exchanges.values().filter(|e| e.state.is_open()).count()
    }

    /// Start an exchange: push the user message and an empty assistant reply.
    ///
    /// The returned request carries every earlier message except replies that
    /// never completed.
    pub fn begin_send(&mut self, text: &str) -> Result<Outgoing, ConversationError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ConversationError::EmptyMessage);
        }

        let history = self.history();

        let prompt = ChatMessage::user(text);
        let reply = ChatMessage::assistant_placeholder();
        let reply_id = reply.id.clone();

        self.exchanges
            .insert(reply_id.clone(), Exchange::new(prompt.id.clone()));
        self.messages.push(prompt);
        self.messages.push(reply);

        log::debug!("Opened exchange {reply_id}");

        Ok(Outgoing {
            reply_id,
            request: ChatRequest::builder()
                .message(text)
                .conversation_history(history)
                .build(),
        })
    }

    fn history(&self) -> Vec<HistoryEntry> {
        self.messages
            .iter()
            .filter(|m| match m.role {
                MessageRole::User => true,
                MessageRole::Assistant => self
                    .exchanges
                    .get(&m.id)
                    .is_some_and(|e| e.state == ExchangeState::Completed),
            })
            .map(HistoryEntry::from)
            .collect()
    }

    /// The first byte of the response arrived.
    pub fn mark_streaming(&mut self, reply_id: &MessageId) -> Result<(), ConversationError> {
        let (exchange, _) = self.slot(reply_id)?;
        if exchange.state == ExchangeState::Sending {
            exchange.state = ExchangeState::Streaming;
        }
        Ok(())
    }

    /// Apply one decoded frame to the reply it belongs to.
    pub fn apply(&mut self, reply_id: &MessageId, frame: StreamFrame) -> Result<(), ConversationError> {
        let (exchange, message) = self.slot(reply_id)?;

        if !exchange.state.is_open() {
            log::debug!(
                "Ignoring {} frame for {} exchange {reply_id}",
                frame.frame_type(),
                exchange.state
            );
            return Ok(());
        }

        match frame {
            StreamFrame::Sources { sources } => exchange.sources.extend(sources),
            StreamFrame::Chunk { text } => {
                exchange.state = ExchangeState::Streaming;
                message.content.push_str(&text);
            }
            StreamFrame::Error { error } => {
                log::warn!("Server reported an error for {reply_id}: {error}");
                Self::mark_failed(exchange, message, error);
            }
            StreamFrame::Unknown => log::debug!("Ignoring unknown frame type for {reply_id}"),
        }
        Ok(())
    }

    /// The response ended normally.
    pub fn complete(&mut self, reply_id: &MessageId) -> Result<(), ConversationError> {
        let (exchange, _) = self.slot(reply_id)?;
        if exchange.state.is_open() {
            exchange.state = ExchangeState::Completed;
        }
        Ok(())
    }

    /// The request or the response body failed.
    ///
    /// Text that already streamed in is kept; an empty placeholder is replaced
    /// with [`FAILURE_MESSAGE`].
    pub fn fail(&mut self, reply_id: &MessageId, reason: impl Into<String>) -> Result<(), ConversationError> {
        let (exchange, message) = self.slot(reply_id)?;
        if exchange.state.is_open() {
            Self::mark_failed(exchange, message, reason.into());
        }
        Ok(())
    }

    /// Fail every exchange still accepting frames. Returns how many were open.
    ///
    /// Used when the owner goes away, so nothing is left loading forever.
    pub fn abandon_open(&mut self, reason: &str) -> usize {
        let open: Vec<MessageId> = self
            .exchanges
            .iter()
            .filter(|(_, e)| e.state.is_open())
            .map(|(id, _)| id.clone())
            .collect();

        for reply_id in &open {
            if let Err(e) = self.fail(reply_id, reason) {
                log::warn!("Could not abandon exchange {reply_id}: {e}");
            }
        }
        open.len()
    }

    fn mark_failed(exchange: &mut Exchange, message: &mut ChatMessage, reason: String) {
        exchange.state = ExchangeState::Failed;
        exchange.error = Some(reason);
        if message.content.is_empty() {
            message.content = FAILURE_MESSAGE.to_string();
        }
    }

    fn slot(&mut self, reply_id: &MessageId) -> Result<(&mut Exchange, &mut ChatMessage), ConversationError> {
        let unknown = || ConversationError::UnknownMessage(reply_id.clone());
        let exchange = self.exchanges.get_mut(reply_id).ok_or_else(unknown)?;
        let message = self
            .messages
            .iter_mut()
            .rev()
            .find(|m| &m.id == reply_id)
            .ok_or_else(unknown)?;
        Ok((exchange, message))
    }
}

/// A [`Conversation`] shared between the UI and any number of in-flight replies.
#[derive(Debug, Clone, Default)]
pub struct SharedConversation(Arc<Mutex<Conversation>>);

impl SharedConversation {
    #[must_use]
    pub fn new(conversation: Conversation) -> Self {
        Self(Arc::new(Mutex::new(conversation)))
    }

    /// Run `f` with exclusive access to the conversation.
    pub fn with<R>(&self, f: impl FnOnce(&mut Conversation) -> R) -> R {
        let mut guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.with(|c| c.messages().to_vec())
    }

    pub fn exchange(&self, reply_id: &MessageId) -> Option<Exchange> {
        self.with(|c| c.exchange(reply_id).cloned())
    }

    pub fn message(&self, id: &MessageId) -> Option<ChatMessage> {
        self.with(|c| c.message(id).cloned())
    }

    pub fn is_loading(&self) -> bool {
        self.with(|c| c.is_loading())
    }
}

/// Feeds one response into the reply created for it.
#[derive(Debug, Clone)]
pub struct ExchangeSink {
    conversation: SharedConversation,
    reply_id: MessageId,
}

impl ExchangeSink {
    pub fn new(conversation: SharedConversation, reply_id: MessageId) -> Self {
        Self {
            conversation,
            reply_id,
        }
    }

    pub fn reply_id(&self) -> &MessageId {
        &self.reply_id
    }

    fn update(&self, f: impl FnOnce(&mut Conversation, &MessageId) -> Result<(), ConversationError>) {
        if let Err(e) = self.conversation.with(|c| f(c, &self.reply_id)) {
            log::warn!("Dropping stream update: {e}");
        }
    }
}

impl FrameHandler<StreamFrame> for ExchangeSink {
    fn on_stream_start(&mut self) {
        self.update(Conversation::mark_streaming);
    }

    fn on_frame(&mut self, frame: StreamFrame) {
        self.update(|c, id| c.apply(id, frame));
    }

    fn on_done(&mut self) {
        self.update(Conversation::complete);
    }

    fn on_transport_error(&mut self, error: CommonRequestError) {
        self.update(|c, id| c.fail(id, error.to_string()));
    }
}
