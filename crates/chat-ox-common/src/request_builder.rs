use std::{collections::HashMap, time::Duration};

use futures_util::{TryStreamExt, stream::BoxStream};
use reqwest::{Method, RequestBuilder as ReqwestRequestBuilder};
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    codec::FrameCodec,
    error::{self, CommonRequestError},
    streaming::{ByteStream, NdjsonParser, ndjson_stream},
};

/// HTTP method for API endpoints
#[derive(Debug, Clone)]
pub enum HttpMethod {
    Post,
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Post => Method::POST,
        }
    }
}

/// Authentication method for API requests
#[derive(Debug, Clone)]
pub enum AuthMethod {
    /// Bearer token authentication (Authorization: Bearer <token>)
    Bearer(String),
    /// API key header (e.g., x-api-key: <key>)
    ApiKey { header_name: String, key: String },
}

/// Represents an API endpoint with its configuration
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub path: String,
    pub method: HttpMethod,
    pub extra_headers: Option<HashMap<String, String>>,
}

impl Endpoint {
    pub fn new(path: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            path: path.into(),
            method,
            extra_headers: None,
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut headers = self.extra_headers.unwrap_or_default();
        headers.insert(key.into(), value.into());
        self.extra_headers = Some(headers);
        self
    }
}

/// Configuration for request building
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub base_url: String,
    pub auth: Option<AuthMethod>,
    pub default_headers: HashMap<String, String>,
    pub user_agent: Option<String>,
    /// Overall deadline for one request, body included.
    pub timeout: Option<Duration>,
}

impl RequestConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth: None,
            default_headers: HashMap::new(),
            user_agent: None,
            timeout: None,
        }
    }

    pub fn with_auth(mut self, auth: AuthMethod) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(key.into(), value.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Builds and sends requests whose response body is newline-delimited JSON
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    client: reqwest::Client,
    config: RequestConfig,
}

impl RequestBuilder {
    pub fn new(client: reqwest::Client, config: RequestConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    /// Full URL for an endpoint path
    pub fn url_for(&self, endpoint: &Endpoint) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            endpoint.path.trim_start_matches('/')
        )
    }

    /// Build a reqwest RequestBuilder for the given endpoint
    pub fn build_request(
        &self,
        endpoint: &Endpoint,
    ) -> Result<ReqwestRequestBuilder, CommonRequestError> {
        if self.config.base_url.trim().is_empty() {
            return Err(CommonRequestError::RequestBuilder(
                "base URL is empty".to_string(),
            ));
        }

        let method: Method = endpoint.method.clone().into();
        let mut req = self.client.request(method, self.url_for(endpoint));

        if let Some(ref auth) = self.config.auth {
            req = match auth {
                AuthMethod::Bearer(token) => req.bearer_auth(token),
                AuthMethod::ApiKey { header_name, key } => req.header(header_name, key),
            };
        }

        for (key, value) in &self.config.default_headers {
            req = req.header(key, value);
        }

        if let Some(ref headers) = endpoint.extra_headers {
            for (key, value) in headers {
                req = req.header(key, value);
            }
        }

        if let Some(ref user_agent) = self.config.user_agent {
            req = req.header("user-agent", user_agent);
        }

        if let Some(timeout) = self.config.timeout {
            req = req.timeout(timeout);
        }

        if matches!(endpoint.method, HttpMethod::Post) {
            req = req.header("content-type", "application/json");
        }

        Ok(req.header("accept", "application/x-ndjson"))
    }

    /// Send the request and hand back the raw response body.
    ///
    /// A non-success status is turned into [`CommonRequestError::Api`] before
    /// any byte of the body is handed out.
    pub async fn open_stream<B: Serialize + ?Sized>(
        &self,
        endpoint: &Endpoint,
        body: Option<&B>,
    ) -> Result<ByteStream, CommonRequestError> {
        let mut req = self.build_request(endpoint)?;

        if let Some(body) = body {
            let payload = serde_json::to_value(body)?;
            log::debug!("POST {} payload: {}", endpoint.path, payload);
            req = req.json(&payload);
        }

        let response = req.send().await?;
        let status = response.status();

        if !status.is_success() {
            let bytes = response.bytes().await?;
            return Err(error::parse_error_response(status, &bytes));
        }

        Ok(Box::pin(response.bytes_stream().map_err(CommonRequestError::from)))
    }

    /// Execute a streaming request and decode each body line as `T`
    pub fn stream<T, B>(
        &self,
        endpoint: &Endpoint,
        body: Option<&B>,
        codec: FrameCodec<T>,
    ) -> BoxStream<'static, Result<T, CommonRequestError>>
    where
        T: DeserializeOwned + Send + 'static,
        B: Serialize + ?Sized,
    {
        let body_value = match body.map(serde_json::to_value).transpose() {
            Ok(value) => value,
            Err(e) => {
                return Box::pin(futures_util::stream::once(async move {
                    Err::<T, CommonRequestError>(e.into())
                }));
            }
        };

        let builder = self.clone();
        let endpoint = endpoint.clone();

        Box::pin(async_stream::try_stream! {
            let body = builder.open_stream(&endpoint, body_value.as_ref()).await?;
            let mut frames = ndjson_stream(NdjsonParser::from_byte_stream(body).with_codec(codec));

            use futures_util::StreamExt;
            while let Some(frame) = frames.next().await {
                yield frame?;
            }
        })
    }
}
