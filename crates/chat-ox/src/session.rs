use std::sync::Arc;

use async_trait::async_trait;
use bon::Builder;
use chat_ox_common::{
    ByteStream, CancellationToken, CommonRequestError, ConsumeOutcome, FrameCodec, NdjsonParser,
    TrailingLine, consume,
};

use crate::{
    capability::{CapabilityError, Capabilities},
    conversation::{ExchangeSink, SharedConversation},
    error::ChatError,
    frame::StreamFrame,
    message::MessageId,
    request::ChatRequest,
};

/// Recorded as the error of exchanges cut short by [`ChatSession::close`].
pub const CLOSED_REASON: &str = "session closed";

/// Anything that can turn a chat request into a response body.
///
/// Implementations must report a non-success status as an error instead of
/// returning its body.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream, CommonRequestError>;
}

/// How one send ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Id of the assistant message the reply streamed into.
    pub id: MessageId,
    /// How the response body ended, not how the exchange ended.
    ///
    /// An `error` frame fails the exchange while the body still completes
    /// normally; read [`Exchange::state`](crate::Exchange::state) for that.
    pub outcome: ConsumeOutcome,
}

/// One mounted chat: the conversation, the transport, and the lifetime of
/// every request made on its behalf.
///
/// Closing or dropping the session cancels all in-flight replies and fails
/// any exchange that was still open; no frame is applied to the conversation
/// afterwards.
#[derive(Builder)]
pub struct ChatSession {
    transport: Arc<dyn Transport>,
    #[builder(default)]
    conversation: SharedConversation,
    #[builder(default)]
    capabilities: Capabilities,
    /// Lines longer than this many bytes are dropped.
    max_line_length: Option<usize>,
    #[builder(default)]
    trailing_line: TrailingLine,
    #[builder(skip)]
    shutdown: CancellationToken,
}

impl ChatSession {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::builder().transport(Arc::new(transport)).build()
    }

    pub fn conversation(&self) -> &SharedConversation {
        &self.conversation
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Send a user message and stream the reply into the conversation.
    ///
    /// Resolves once the reply has completed, failed, or been cancelled. Several
    /// sends may run at once; each gets its own parser and buffer.
    pub async fn send(&self, text: &str) -> Result<Reply, ChatError> {
        if self.is_closed() {
            return Err(ChatError::SessionClosed);
        }

        let outgoing = self.conversation.with(|c| c.begin_send(text))?;
        let reply_id = outgoing.reply_id;
        let cancel = self.shutdown.child_token();

        let opened = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            opened = self.transport.open(&outgoing.request) => Some(opened),
        };

        let body = match opened {
            None => {
                return Ok(Reply {
                    id: reply_id,
                    outcome: ConsumeOutcome::Cancelled,
                });
            }
            Some(Err(e)) => {
                log::warn!("Chat request failed: {e}");
                self.conversation.with(|c| c.fail(&reply_id, e.to_string()))?;
                return Ok(Reply {
                    id: reply_id,
                    outcome: ConsumeOutcome::Failed,
                });
            }
            Some(Ok(body)) => body,
        };

        let parser = NdjsonParser::from_byte_stream(body).with_codec(self.codec());
        let mut sink = ExchangeSink::new(self.conversation.clone(), reply_id.clone());
        let outcome = consume(parser, &mut sink, &cancel).await;

        log::debug!("Reply {reply_id} finished: {outcome:?}");
        Ok(Reply {
            id: reply_id,
            outcome,
        })
    }

    /// Transcribe one utterance with the host's speech input.
    ///
    /// Returns `Ok(None)` when no speech input is available.
    pub async fn dictate(&self) -> Result<Option<String>, ChatError> {
        let Some(speech) = self.capabilities.speech() else {
            return Ok(None);
        };

        match speech.transcribe().await {
            Ok(text) => Ok(Some(text)),
            Err(CapabilityError::Unavailable(what)) => {
                log::debug!("{what} became unavailable, dictation disabled");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Cancel every in-flight reply and refuse new sends.
    ///
    /// Text that already streamed in is kept; open exchanges end as
    /// [`ExchangeState::Failed`](crate::ExchangeState::Failed).
    pub fn close(&self) {
        self.shutdown.cancel();
        let abandoned = self.conversation.with(|c| c.abandon_open(CLOSED_REASON));
        if abandoned > 0 {
            log::debug!("Session closed with {abandoned} open replies");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    fn codec(&self) -> FrameCodec<StreamFrame> {
        let codec = FrameCodec::new().with_trailing_line(self.trailing_line);
        match self.max_line_length {
            Some(max) => codec.with_max_length(max),
            None => codec,
        }
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.close();
    }
}
