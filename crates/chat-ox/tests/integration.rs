#[cfg(test)]
mod tests {
    use chat_ox::{
        ChatAssistant, ChatError, ChatRequest, ChatSession, CommonRequestError, ConsumeOutcome,
        ExchangeState, FAILURE_MESSAGE, StreamFrame,
    };
    use futures_util::StreamExt;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_partial_json, header, method, path},
    };

    const REPLY: &str = concat!(
        "{\"type\":\"sources\",\"sources\":[{\"title\":\"Fairness guide\",\"url\":\"https://example.org/guide\"}]}\n",
        "{\"type\":\"chunk\",\"text\":\"Demographic parity \"}\n",
        "{\"type\":\"chunk\",\"text\":\"compares rates.\"}\n",
    );

    fn ndjson(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "application/x-ndjson")
    }

    #[tokio::test]
    async fn session_streams_reply_from_http_backend() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/stream"))
            .and(header("authorization", "Bearer secret"))
            .and(header("accept", "application/x-ndjson"))
            .and(body_partial_json(json!({
                "message": "What is demographic parity?",
                "conversation_history": []
            })))
            .respond_with(ndjson(REPLY))
            .expect(1)
            .mount(&server)
            .await;

        let assistant = ChatAssistant::builder()
            .base_url(server.uri())
            .api_key("secret")
            .build();
        let session = ChatSession::new(assistant);

        let reply = session.send("What is demographic parity?").await.unwrap();

        assert_eq!(reply.outcome, ConsumeOutcome::Completed);
        let conversation = session.conversation();
        assert_eq!(
            conversation.message(&reply.id).unwrap().content,
            "Demographic parity compares rates."
        );
        let exchange = conversation.exchange(&reply.id).unwrap();
        assert_eq!(exchange.state(), ExchangeState::Completed);
        assert_eq!(exchange.sources()[0].url.as_deref(), Some("https://example.org/guide"));
    }

    #[tokio::test]
    async fn follow_up_carries_history() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "message": "And equal opportunity?" })))
            .and(body_partial_json(json!({
                "conversation_history": [
                    { "role": "user", "content": "What is demographic parity?" },
                    { "role": "assistant", "content": "Demographic parity compares rates." }
                ]
            })))
            .respond_with(ndjson("{\"type\":\"chunk\",\"text\":\"It compares TPR.\"}\n"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "message": "What is demographic parity?" })))
            .respond_with(ndjson(REPLY))
            .mount(&server)
            .await;

        let session = ChatSession::new(ChatAssistant::new(server.uri()));
        session.send("What is demographic parity?").await.unwrap();
        let reply = session.send("And equal opportunity?").await.unwrap();

        assert_eq!(
            session.conversation().message(&reply.id).unwrap().content,
            "It compares TPR."
        );
    }

    #[tokio::test]
    async fn server_error_fails_the_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "model crashed"})))
            .mount(&server)
            .await;

        let session = ChatSession::new(ChatAssistant::new(server.uri()));
        let reply = session.send("hello").await.unwrap();

        assert_eq!(reply.outcome, ConsumeOutcome::Failed);
        let exchange = session.conversation().exchange(&reply.id).unwrap();
        assert_eq!(exchange.state(), ExchangeState::Failed);
        assert_eq!(exchange.error(), Some("HTTP 500: model crashed"));
        assert_eq!(
            session.conversation().message(&reply.id).unwrap().content,
            FAILURE_MESSAGE
        );
        assert!(!session.conversation().is_loading());
    }

    #[tokio::test]
    async fn stream_yields_typed_frames() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/assistant"))
            .respond_with(ndjson(concat!(
                "{\"type\":\"chunk\",\"text\":\"hi\"}\n",
                "{\"type\":\"heartbeat\"}\n",
                "{\"type\":\"error\",\"error\":\"rate limited\"}\n",
            )))
            .mount(&server)
            .await;

        let assistant = ChatAssistant::builder()
            .base_url(format!("{}/", server.uri()))
            .endpoint("/v1/assistant")
            .build();
        let request = ChatRequest::builder().message("hi").build();

        let frames: Vec<StreamFrame> = assistant
            .stream(&request)
            .map(Result::unwrap)
            .collect()
            .await;

        assert_eq!(
            frames,
            vec![
                StreamFrame::chunk("hi"),
                StreamFrame::Unknown,
                StreamFrame::error("rate limited"),
            ]
        );
    }

    #[tokio::test]
    async fn stream_surfaces_status_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
            .mount(&server)
            .await;

        let request = ChatRequest::builder().message("hi").build();
        let mut stream = ChatAssistant::new(server.uri()).stream(&request);

        match stream.next().await {
            Some(Err(ChatError::Request(CommonRequestError::Api { status, message }))) => {
                assert_eq!(status, 401);
                assert_eq!(message, "bad token");
            }
            other => panic!("expected an API error, got {other:?}"),
        }
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn debug_output_hides_api_key() {
        let assistant = ChatAssistant::builder()
            .base_url("http://localhost:8000")
            .api_key("super-secret")
            .build();

        let debug = format!("{assistant:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("super-secret"));
        assert_eq!(assistant.endpoint(), "chat/stream");
    }
}
