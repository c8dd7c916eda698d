use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt, TryStreamExt, stream::BoxStream};
use serde::de::DeserializeOwned;
use tokio_util::{codec::Decoder, sync::CancellationToken};

use crate::{codec::FrameCodec, error::CommonRequestError};

/// Raw response body as delivered by the transport
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, CommonRequestError>> + Send>>;

/// Newline-delimited JSON parser for streaming responses.
///
/// Owns the decode buffer for exactly one response body. Two responses never
/// share a parser.
pub struct NdjsonParser<T> {
    byte_stream: ByteStream,
    codec: FrameCodec<T>,
    buffer: BytesMut,
    started: bool,
    finished: bool,
}

/// Result of pulling one chunk off the byte stream
enum Pull {
    Data { first: bool },
    End,
    Failed(CommonRequestError),
}

impl<T: DeserializeOwned> NdjsonParser<T> {
    /// Build a parser over any chunked byte source.
    pub fn from_byte_stream<S, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Into<CommonRequestError>,
    {
        Self {
            byte_stream: Box::pin(stream.map_err(|e| -> CommonRequestError { e.into() })),
            codec: FrameCodec::new(),
            buffer: BytesMut::new(),
            started: false,
            finished: false,
        }
    }

    /// Replace the default codec, e.g. to cap line length.
    #[must_use]
    pub fn with_codec(mut self, codec: FrameCodec<T>) -> Self {
        self.codec = codec;
        self
    }

    /// Get the next decoded frame from the stream.
    ///
    /// Returns `Ok(None)` once the body has ended. After a read error the parser
    /// yields nothing further.
    pub async fn next_frame(&mut self) -> Result<Option<T>, CommonRequestError> {
        loop {
            if let Some(frame) = self.decode_buffered()? {
                return Ok(Some(frame));
            }
            if self.finished {
                return Ok(None);
            }

            match self.pull().await {
                Pull::Data { .. } => {}
                Pull::End => return self.decode_eof(),
                Pull::Failed(e) => return Err(e),
            }
        }
    }

    fn decode_buffered(&mut self) -> Result<Option<T>, CommonRequestError> {
        if self.finished {
            return Ok(None);
        }
        self.codec.decode(&mut self.buffer)
    }

    fn decode_eof(&mut self) -> Result<Option<T>, CommonRequestError> {
        let frame = self.codec.decode_eof(&mut self.buffer);
        self.buffer.clear();
        frame
    }

    /// Await the next chunk and append it to the buffer.
    async fn pull(&mut self) -> Pull {
        match self.byte_stream.next().await {
            Some(Ok(chunk)) => {
                let first = !self.started;
                self.started = true;
                self.buffer.extend_from_slice(&chunk);
                Pull::Data { first }
            }
            Some(Err(e)) => {
                self.finished = true;
                self.buffer.clear();
                Pull::Failed(e)
            }
            None => {
                self.finished = true;
                Pull::End
            }
        }
    }
}

/// Turn a parser into a stream of frames.
pub fn ndjson_stream<T>(mut parser: NdjsonParser<T>) -> BoxStream<'static, Result<T, CommonRequestError>>
where
    T: DeserializeOwned + Send + 'static,
{
    Box::pin(async_stream::try_stream! {
        while let Some(frame) = parser.next_frame().await? {
            yield frame;
        }
    })
}

/// Receives the decoded frames of one response, in arrival order.
pub trait FrameHandler<T> {
    /// The first chunk of the body arrived.
    fn on_stream_start(&mut self) {}

    /// A complete line decoded into a frame.
    fn on_frame(&mut self, frame: T);

    /// The body ended normally. Called at most once.
    fn on_done(&mut self);

    /// Reading the body failed. Called at most once, and no frame follows it.
    fn on_transport_error(&mut self, error: CommonRequestError);
}

/// How a call to [`consume`] ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// `on_done` was invoked.
    Completed,
    /// `on_transport_error` was invoked.
    Failed,
    /// The token fired; no further callback was invoked.
    Cancelled,
}

/// Drive a parser to completion, dispatching every frame to `handler`.
///
/// Awaiting the next chunk is the only suspension point. `cancel` is checked
/// before each frame is decoded and raced against every read, so once it fires
/// no further callback runs, not even `on_done`.
pub async fn consume<T, H>(
    mut parser: NdjsonParser<T>,
    handler: &mut H,
    cancel: &CancellationToken,
) -> ConsumeOutcome
where
    T: DeserializeOwned,
    H: FrameHandler<T> + ?Sized,
{
    loop {
        if cancel.is_cancelled() {
            return ConsumeOutcome::Cancelled;
        }

        match parser.decode_buffered() {
            Ok(Some(frame)) => {
                handler.on_frame(frame);
                continue;
            }
            Ok(None) => {}
            Err(e) => {
                handler.on_transport_error(e);
                return ConsumeOutcome::Failed;
            }
        }

        let pulled = tokio::select! {
            biased;
            () = cancel.cancelled() => return ConsumeOutcome::Cancelled,
            pulled = parser.pull() => pulled,
        };

        match pulled {
            Pull::Data { first } => {
                if first {
                    handler.on_stream_start();
                }
            }
            Pull::End => {
                if let Ok(Some(frame)) = parser.decode_eof() {
                    handler.on_frame(frame);
                }
                handler.on_done();
                return ConsumeOutcome::Completed;
            }
            Pull::Failed(e) => {
                log::warn!("Response stream failed: {e}");
                handler.on_transport_error(e);
                return ConsumeOutcome::Failed;
            }
        }
    }
}
