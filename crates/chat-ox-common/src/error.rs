use thiserror::Error;

/// Errors that can occur while opening or reading a streamed chat response
#[derive(Error, Debug)]
pub enum CommonRequestError {
    /// HTTP request failed, either while connecting or while reading the body
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The server answered with a non-success status before streaming began
    #[error("HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// Reading a byte source through a codec failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Byte source failure reported by a non-HTTP transport
    #[error("Transport error: {0}")]
    Transport(String),

    /// Error originating from the request builder
    #[error("Request builder error: {0}")]
    RequestBuilder(String),
}

impl CommonRequestError {
    /// Status code of the failed response, if the error came from the server
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Parse error response from HTTP status and body
pub fn parse_error_response(status: reqwest::StatusCode, body: &bytes::Bytes) -> CommonRequestError {
    let message = serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|json| extract_error_message(&json))
        .unwrap_or_else(|| {
            let raw = String::from_utf8_lossy(body).trim().to_string();
            if raw.is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                raw
            }
        });

    CommonRequestError::Api {
        status: status.as_u16(),
        message,
    }
}

/// Extract error message from the JSON error shapes the backend is known to emit
fn extract_error_message(json: &serde_json::Value) -> Option<String> {
    // {"error": {"message": "..."}}
    if let Some(msg) = json
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(serde_json::Value::as_str)
    {
        return Some(msg.to_string());
    }

    // {"error": "..."}
    if let Some(msg) = json.get("error").and_then(serde_json::Value::as_str) {
        return Some(msg.to_string());
    }

    // {"detail": "..."}
    if let Some(msg) = json.get("detail").and_then(serde_json::Value::as_str) {
        return Some(msg.to_string());
    }

    json.get("message")
        .and_then(serde_json::Value::as_str)
        .map(ToString::to_string)
}
