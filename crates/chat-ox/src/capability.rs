//! Optional host capabilities.
//!
//! Voice input lives in the embedding environment (a browser, a desktop shell).
//! The chat core only sees the trait; when nothing is injected the feature is
//! reported as unavailable and every call degrades to a no-op.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("{0} is not available")]
    Unavailable(&'static str),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("capture failed: {0}")]
    Failed(String),
}

/// Speech-to-text provided by the host.
#[async_trait]
pub trait SpeechInput: Send + Sync {
    /// Record one utterance and return its transcript.
    async fn transcribe(&self) -> Result<String, CapabilityError>;

    /// Whether the host can record right now.
    fn is_available(&self) -> bool {
        true
    }
}

/// The set of optional capabilities injected into a session.
#[derive(Clone, Default)]
pub struct Capabilities {
    speech: Option<Arc<dyn SpeechInput>>,
}

impl Capabilities {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_speech(mut self, speech: impl SpeechInput + 'static) -> Self {
        self.speech = Some(Arc::new(speech));
        self
    }

    /// Speech input, if one was injected and reports itself available.
    pub fn speech(&self) -> Option<&dyn SpeechInput> {
        self.speech
            .as_deref()
            .filter(|speech| speech.is_available())
    }

    pub fn has_speech(&self) -> bool {
        self.speech().is_some()
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("speech", &self.speech.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Offline;

    #[async_trait]
    impl SpeechInput for Offline {
        async fn transcribe(&self) -> Result<String, CapabilityError> {
            Err(CapabilityError::Unavailable("microphone"))
        }

        fn is_available(&self) -> bool {
            false
        }
    }

    #[test]
    fn empty_set_has_nothing() {
        assert!(!Capabilities::new().has_speech());
    }

    #[test]
    fn unavailable_speech_is_hidden() {
        let caps = Capabilities::new().with_speech(Offline);
        assert!(caps.speech().is_none());
        assert_eq!(format!("{caps:?}"), "Capabilities { speech: true }");
    }
}
