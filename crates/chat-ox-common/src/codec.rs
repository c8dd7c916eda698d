//! Line framing for newline-delimited JSON bodies.
//!
//! [`FrameCodec`] works on raw bytes: a line is only split off the buffer once
//! its terminating `\n` has arrived, so an incomplete UTF-8 sequence at the end
//! of a network chunk simply waits in the buffer for the rest of its bytes.
//! Text decoding happens per complete line, never per chunk.

use std::{cmp, marker::PhantomData};

use bytes::{Buf, BytesMut};
use serde::de::DeserializeOwned;
use tokio_util::codec::Decoder;

use crate::error::CommonRequestError;

/// What to do with bytes left in the buffer when the stream ends without a
/// final newline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrailingLine {
    /// Drop the residue. A line is only a frame once it is newline-terminated.
    #[default]
    Discard,
    /// Try to parse the residue as one last frame.
    Parse,
}

/// Decodes one JSON value of type `T` per `\n`-terminated line.
///
/// Blank lines are skipped. Lines that are not valid JSON for `T` are logged
/// and skipped; they never fail the decoder.
pub struct FrameCodec<T> {
    /// Index into the buffer up to which we already know there is no newline.
    next_index: usize,
    /// Lines longer than this many bytes are dropped.
    max_length: usize,
    /// Set while dropping the remainder of an overlong line.
    is_discarding: bool,
    trailing: TrailingLine,
    _frame: PhantomData<fn() -> T>,
}

impl<T> FrameCodec<T> {
    pub fn new() -> Self {
        Self {
            next_index: 0,
            max_length: usize::MAX,
            is_discarding: false,
            trailing: TrailingLine::Discard,
            _frame: PhantomData,
        }
    }

    /// Drop any line longer than `max_length` bytes instead of buffering it.
    #[must_use]
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    #[must_use]
    pub fn with_trailing_line(mut self, trailing: TrailingLine) -> Self {
        self.trailing = trailing;
        self
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn trailing_line(&self) -> TrailingLine {
        self.trailing
    }
}

impl<T> Default for FrameCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned> Decoder for FrameCodec<T> {
    type Item = T;
    type Error = CommonRequestError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<T>, CommonRequestError> {
        loop {
            let read_to = cmp::min(self.max_length.saturating_add(1), buf.len());
            let newline = buf[self.next_index..read_to]
                .iter()
                .position(|b| *b == b'\n');

            match (self.is_discarding, newline) {
                (true, Some(offset)) => {
                    buf.advance(self.next_index + offset + 1);
                    self.is_discarding = false;
                    self.next_index = 0;
                }
                (true, None) => {
                    buf.advance(read_to);
                    self.next_index = 0;
                    if buf.is_empty() {
                        return Ok(None);
                    }
                }
                (false, Some(offset)) => {
                    let end = self.next_index + offset;
                    self.next_index = 0;
                    let line = buf.split_to(end + 1);
                    if let Some(frame) = parse_line(&line[..end]) {
                        return Ok(Some(frame));
                    }
                }
                (false, None) if buf.len() > self.max_length => {
                    log::warn!(
                        "Discarding stream line longer than {} bytes",
                        self.max_length
                    );
                    self.is_discarding = true;
                }
                (false, None) => {
                    self.next_index = read_to;
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<T>, CommonRequestError> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }

        self.next_index = 0;
        if buf.is_empty() {
            return Ok(None);
        }

        let residue = buf.split();
        if self.is_discarding {
            self.is_discarding = false;
            return Ok(None);
        }

        match self.trailing {
            TrailingLine::Discard => {
                log::debug!(
                    "Stream ended with {} bytes of unterminated line, discarding",
                    residue.len()
                );
                Ok(None)
            }
            TrailingLine::Parse => Ok(parse_line(&residue)),
        }
    }
}

/// Decode one complete line. `None` for blank or malformed lines.
fn parse_line<T: DeserializeOwned>(raw: &[u8]) -> Option<T> {
    let text = String::from_utf8_lossy(raw);
    let line = text.trim();
    if line.is_empty() {
        return None;
    }

    match serde_json::from_str(line) {
        Ok(frame) => Some(frame),
        Err(e) => {
            log::warn!("Skipping malformed stream line: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn drain(codec: &mut FrameCodec<Value>, buf: &mut BytesMut) -> Vec<Value> {
        let mut out = Vec::new();
        while let Some(frame) = codec.decode(buf).expect("decode never fails") {
            out.push(frame);
        }
        out
    }

    #[tokio::test]
    async fn works_as_a_framed_reader() {
        use futures_util::TryStreamExt;
        use tokio_util::codec::FramedRead;

        let body: &[u8] = b"{\"a\":1}\nnot json\n{\"a\":2}\n{\"a\":";
        let frames: Vec<Value> = FramedRead::new(body, FrameCodec::<Value>::new())
            .try_collect()
            .await
            .expect("in-memory reads never fail");
        assert_eq!(frames, vec![json!({"a":1}), json!({"a":2})]);
    }

    #[test]
    fn read_errors_convert_into_request_errors() {
        let err = CommonRequestError::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "peer went away",
        ));
        assert!(matches!(err, CommonRequestError::Io(_)));
        assert_eq!(err.to_string(), "I/O error: peer went away");
    }

    #[test]
    fn partial_line_is_held_until_newline() {
        let mut codec = FrameCodec::<Value>::new();
        let mut buf = BytesMut::from(&br#"{"type":"chunk","te"#[..]);
        assert!(drain(&mut codec, &mut buf).is_empty());

        buf.extend_from_slice(b"xt\":\"hi\"}\n");
        assert_eq!(drain(&mut codec, &mut buf), vec![json!({"type":"chunk","text":"hi"})]);
        assert!(buf.is_empty());
    }

    #[test]
    fn blank_and_crlf_lines() {
        let mut codec = FrameCodec::<Value>::new();
        let mut buf = BytesMut::from(&b"\n  \r\n{\"a\":1}\r\n\n"[..]);
        assert_eq!(drain(&mut codec, &mut buf), vec![json!({"a":1})]);
    }

    #[test]
    fn malformed_line_between_valid_lines_is_skipped() {
        let mut codec = FrameCodec::<Value>::new();
        let mut buf = BytesMut::from(&b"{\"a\":1}\n{not json}\n{\"a\":2}\n"[..]);
        assert_eq!(drain(&mut codec, &mut buf), vec![json!({"a":1}), json!({"a":2})]);
    }

    #[test]
    fn split_multibyte_character_survives() {
        let line = "{\"text\":\"café ✓\"}\n".as_bytes();
        let cut = line.iter().position(|b| *b == 0xE2).expect("check mark present") + 1;
        let mut codec = FrameCodec::<Value>::new();
        let mut buf = BytesMut::from(&line[..cut]);
        assert!(drain(&mut codec, &mut buf).is_empty());

        buf.extend_from_slice(&line[cut..]);
        assert_eq!(drain(&mut codec, &mut buf), vec![json!({"text":"café ✓"})]);
    }

    #[test]
    fn trailing_residue_is_discarded_by_default() {
        let mut codec = FrameCodec::<Value>::new();
        let mut buf = BytesMut::from(&br#"{"type":"chu"#[..]);
        assert!(codec.decode_eof(&mut buf).expect("eof").is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn trailing_residue_can_be_parsed() {
        let mut codec = FrameCodec::<Value>::new().with_trailing_line(TrailingLine::Parse);
        let mut buf = BytesMut::from(&br#"{"a":1}"#[..]);
        assert_eq!(codec.decode_eof(&mut buf).expect("eof"), Some(json!({"a":1})));
    }

    #[test]
    fn overlong_line_is_dropped_and_framing_recovers() {
        let mut codec = FrameCodec::<Value>::new().with_max_length(16);
        let mut buf = BytesMut::from(&br#"{"padding":"xxxxxxxxxxxx"#[..]);
        assert!(drain(&mut codec, &mut buf).is_empty());

        buf.extend_from_slice(b"xxxx\"}\n{\"a\":1}\n");
        assert_eq!(drain(&mut codec, &mut buf), vec![json!({"a":1})]);
    }
}
