//! Integration tests for `GeminiClient` using wiremock HTTP mocks.

use kantoi_sentiment::{GeminiClient, GeminiConfig, SentimentError, TextOracle};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(base_url: &str, max_retries: u32) -> GeminiClient {
    GeminiClient::new(&GeminiConfig {
        api_key: "test-key".to_string(),
        base_url: base_url.to_string(),
        model: "gemini-test".to_string(),
        timeout_secs: 5,
        max_retries,
        backoff_base_ms: 0,
    })
    .expect("client construction should not fail")
}

fn reply(text: &str) -> serde_json::Value {
    serde_json::json!({
        "candidates": [
            { "content": { "parts": [ { "text": text } ], "role": "model" } }
        ]
    })
}

#[tokio::test]
async fn generate_returns_candidate_text() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-test:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(serde_json::json!({
            "generationConfig": { "responseMimeType": "application/json" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply(r#"{"sentiment": -1}"#)))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 0);
    let text = client.generate("classify this", 0.2).await.expect("reply");
    assert_eq!(text, r#"{"sentiment": -1}"#);
}

#[tokio::test]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply("{}")))
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 3);
    let text = client.generate("prompt", 0.2).await.expect("reply after retries");
    assert_eq!(text, "{}");
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 3);
    let err = client.generate("prompt", 0.2).await.unwrap_err();
    match err {
        SentimentError::Oracle { status, message } => {
            assert_eq!(status, 403);
            assert!(message.contains("API key not valid"));
        }
        other => panic!("expected Oracle error, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_candidates_are_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "candidates": [] })),
        )
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 0);
    let err = client.generate("prompt", 0.2).await.unwrap_err();
    assert!(matches!(err, SentimentError::EmptyReply));
}
