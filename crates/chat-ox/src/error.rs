use thiserror::Error;

pub use chat_ox_common::error::CommonRequestError;

use crate::{capability::CapabilityError, message::MessageId};

/// Errors raised by the conversation state holder
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConversationError {
    /// Nothing to send
    #[error("message is empty")]
    EmptyMessage,

    /// No assistant reply with this id exists in the conversation
    #[error("no assistant reply with id {0}")]
    UnknownMessage(MessageId),
}

/// Errors that can occur when talking to the chat assistant
#[derive(Debug, Error)]
pub enum ChatError {
    /// Request could not be built, sent or read
    #[error(transparent)]
    Request(#[from] CommonRequestError),

    #[error(transparent)]
    Conversation(#[from] ConversationError),

    #[error(transparent)]
    Capability(#[from] CapabilityError),

    /// No base URL configured
    #[error("CHAT_OX_BASE_URL is not set")]
    MissingBaseUrl,

    /// A configuration value could not be parsed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The session was closed before the call started
    #[error("chat session is closed")]
    SessionClosed,
}
