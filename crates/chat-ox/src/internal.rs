use std::time::Duration;

use chat_ox_common::{
    BoxStream, ByteStream, CommonRequestError, FrameCodec,
    request_builder::{AuthMethod, Endpoint, HttpMethod, RequestBuilder, RequestConfig},
};
use futures_util::TryStreamExt;

use crate::{error::ChatError, frame::StreamFrame, request::ChatRequest};

/// Chat client helper methods using the common RequestBuilder
pub(crate) struct ChatRequestHelper {
    request_builder: RequestBuilder,
    endpoint: Endpoint,
}

impl ChatRequestHelper {
    pub(crate) fn new(
        client: reqwest::Client,
        base_url: &str,
        endpoint: &str,
        api_key: Option<&str>,
        timeout: Option<Duration>,
    ) -> Self {
        let mut config = RequestConfig::new(base_url)
            .with_user_agent(concat!("chat-ox/", env!("CARGO_PKG_VERSION")));

        if let Some(token) = api_key {
            config = config.with_auth(AuthMethod::Bearer(token.to_string()));
        }
        if let Some(timeout) = timeout {
            config = config.with_timeout(timeout);
        }

        Self {
            request_builder: RequestBuilder::new(client, config),
            endpoint: Endpoint::new(endpoint, HttpMethod::Post),
        }
    }

    /// Post the request and return the unread response body
    pub(crate) async fn open_chat_stream(
        &self,
        request: &ChatRequest,
    ) -> Result<ByteStream, CommonRequestError> {
        self.request_builder
            .open_stream(&self.endpoint, Some(request))
            .await
    }

    /// Post the request and decode the body into frames
    pub(crate) fn stream_chat_request(
        &self,
        request: &ChatRequest,
    ) -> BoxStream<'static, Result<StreamFrame, ChatError>> {
        Box::pin(
            self.request_builder
                .stream(&self.endpoint, Some(request), FrameCodec::<StreamFrame>::new())
                .map_err(ChatError::from),
        )
    }
}
