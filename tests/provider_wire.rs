//! Wire-level provider tests against a mock HTTP server: request shapes,
//! response parsing, streaming decode, and error body preservation.

use futures::StreamExt;
use mockito::Server;

use ai_hub::provider::{
    ChatProvider, EmbeddingProvider, OllamaProvider, OpenAiCompatProvider,
};
use ai_hub::types::{CallOptions, Message, StreamEvent};
use ai_hub::Error;

// --- Ollama ---

#[tokio::test]
async fn test_ollama_chat_parses_content_and_usage() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/chat")
        .match_body(mockito::Matcher::PartialJson(serde_json::json!({
            "model": "llama3.1",
            "stream": false,
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"message":{"role":"assistant","content":"hello there"},
                "done":true,"prompt_eval_count":12,"eval_count":4}"#,
        )
        .create_async()
        .await;

    let provider = OllamaProvider::with_base_url(server.url()).unwrap();
    let outcome = provider
        .chat(&[Message::user("hi")], "llama3.1", &CallOptions::new())
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(outcome.content, "hello there");
    assert_eq!(outcome.provider, "ollama");
    let usage = outcome.usage.unwrap();
    assert_eq!(usage.prompt_tokens, 12);
    assert_eq!(usage.total_tokens, 16);
}

#[tokio::test]
async fn test_ollama_model_not_found_preserves_daemon_diagnostic() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/chat")
        .with_status(404)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":"model 'mistral' not found, try pulling it first"}"#)
        .create_async()
        .await;

    let provider = OllamaProvider::with_base_url(server.url()).unwrap();
    let err = provider
        .chat(&[Message::user("hi")], "mistral", &CallOptions::new())
        .await
        .unwrap_err();

    match &err {
        Error::ProviderFailure { provider, operation, .. } => {
            assert_eq!(provider, "ollama");
            assert_eq!(*operation, "chat");
        }
        other => panic!("expected provider failure, got {:?}", other),
    }
    let text = err.to_string();
    assert!(text.contains("try pulling it first"), "lost diagnostic: {}", text);
}

#[tokio::test]
async fn test_ollama_stream_decodes_ndjson_in_order() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/chat")
        .with_status(200)
        .with_header("content-type", "application/x-ndjson")
        .with_body(concat!(
            "{\"message\":{\"content\":\"Hel\"},\"done\":false}\n",
            "{\"message\":{\"content\":\"lo\"},\"done\":false}\n",
            "{\"message\":{\"content\":\"\"},\"done\":true,\"done_reason\":\"stop\",",
            "\"prompt_eval_count\":2,\"eval_count\":5}\n",
        ))
        .create_async()
        .await;

    let provider = OllamaProvider::with_base_url(server.url()).unwrap();
    let events: Vec<StreamEvent> = provider
        .chat_stream(&[Message::user("hi")], "llama3.1", &CallOptions::new())
        .await
        .unwrap()
        .map(|e| e.unwrap())
        .collect()
        .await;

    let deltas: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::ContentDelta { content } => Some(content.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(deltas, ["Hel", "lo"]);
    assert!(matches!(
        events.last(),
        Some(StreamEvent::StreamEnd { finish_reason: Some(r) }) if r == "stop"
    ));
}

#[tokio::test]
async fn test_ollama_embed_parses_rows() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/embed")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"embeddings":[[0.1,0.2],[0.3,0.4]]}"#)
        .create_async()
        .await;

    let provider = OllamaProvider::with_base_url(server.url()).unwrap();
    let vectors = provider
        .embed_batch(&["a".into(), "b".into()], "nomic-embed-text")
        .await
        .unwrap();
    assert_eq!(vectors, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
}

// --- OpenAI-compatible ---

#[tokio::test]
async fn test_openai_chat_sends_bearer_and_parses_choice() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", "Bearer test-key")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"choices":[{"message":{"role":"assistant","content":"pong"},"finish_reason":"stop"}],
                "usage":{"prompt_tokens":9,"completion_tokens":1,"total_tokens":10}}"#,
        )
        .create_async()
        .await;

    let provider = OpenAiCompatProvider::new("openai", server.url())
        .unwrap()
        .with_api_key("test-key");
    let outcome = provider
        .chat(&[Message::user("ping")], "gpt-4o-mini", &CallOptions::new())
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(outcome.content, "pong");
    assert_eq!(outcome.usage.unwrap().total_tokens, 10);
}

#[tokio::test]
async fn test_openai_error_message_surfaces() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/v1/chat/completions")
        .with_status(401)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#)
        .create_async()
        .await;

    let provider = OpenAiCompatProvider::new("openai", server.url())
        .unwrap()
        .with_api_key("bad");
    let err = provider
        .chat(&[Message::user("hi")], "gpt-4o-mini", &CallOptions::new())
        .await
        .unwrap_err();
    let text = err.to_string();
    assert!(text.contains("Incorrect API key provided"), "{}", text);
}

#[tokio::test]
async fn test_openai_stream_stops_on_done_marker() {
    let mut server = Server::new_async().await;
    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"one \"},\"index\":0}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"two\"},\"index\":0}]}\n\n",
        "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
        "data: [DONE]\n\n",
    );
    server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(body)
        .create_async()
        .await;

    let provider = OpenAiCompatProvider::new("openai", server.url())
        .unwrap()
        .with_api_key("test-key");
    let events: Vec<StreamEvent> = provider
        .chat_stream(&[Message::user("hi")], "gpt-4o-mini", &CallOptions::new())
        .await
        .unwrap()
        .map(|e| e.unwrap())
        .collect()
        .await;

    let deltas: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::ContentDelta { content } => Some(content.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(deltas, ["one ", "two"]);
    assert!(matches!(
        events.last(),
        Some(StreamEvent::StreamEnd { finish_reason: Some(r) }) if r == "stop"
    ));
}

#[tokio::test]
async fn test_openai_embeddings_realigned_by_index() {
    let mut server = Server::new_async().await;
    // Rows deliberately out of order; the index field is authoritative.
    server
        .mock("POST", "/v1/embeddings")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"data":[
                {"index":1,"embedding":[0.3,0.4]},
                {"index":0,"embedding":[0.1,0.2]}
            ]}"#,
        )
        .create_async()
        .await;

    let provider = OpenAiCompatProvider::new("openai", server.url())
        .unwrap()
        .with_api_key("test-key");
    let vectors = provider
        .embed_batch(&["first".into(), "second".into()], "text-embedding-3-small")
        .await
        .unwrap();
    assert_eq!(vectors[0], vec![0.1, 0.2]);
    assert_eq!(vectors[1], vec![0.3, 0.4]);
}

#[tokio::test]
async fn test_openai_without_key_reports_unavailable() {
    use ai_hub::provider::ProviderMeta;
    // No keyring entry and no OPENAI_TEST_NOKEY_API_KEY env var.
    let provider = OpenAiCompatProvider::new("openai-test-nokey", "http://localhost:9").unwrap();
    assert!(!provider.is_available());
}
