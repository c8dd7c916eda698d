#![cfg_attr(not(test), deny(unsafe_code))]
#![warn(
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::missing_docs_in_private_items
)]

//! Shared HTTP and streaming plumbing for the chat-ox assistant client
//!
//! This crate knows nothing about chat semantics. It opens a request, checks the
//! status, and turns a chunked response body into a sequence of JSON frames, one
//! per newline-terminated line.

pub mod codec;
pub mod error;
pub mod request_builder;
pub mod streaming;
pub mod timestamp;

pub use codec::{FrameCodec, TrailingLine};
pub use error::CommonRequestError;
pub use request_builder::{AuthMethod, Endpoint, HttpMethod, RequestBuilder, RequestConfig};
pub use streaming::{ByteStream, ConsumeOutcome, FrameHandler, NdjsonParser, consume, ndjson_stream};
pub use timestamp::Timestamp;

/// Re-export common types for convenience
pub use async_trait::async_trait;
pub use futures_util::stream::BoxStream;
pub use serde::{Deserialize, Serialize};
pub use tokio_util::sync::CancellationToken;
