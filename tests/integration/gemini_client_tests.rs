//! Integration tests for the Gemini client against a mock server

use mitra_server::config::LlmConfig;
use mitra_server::llm::{GeminiClient, LlmError, ReplyGenerator, EMPTY_REPLY};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, models: &[&str]) -> GeminiClient {
    GeminiClient::new(&LlmConfig {
        api_key: "test-key".to_string(),
        base_url: server.uri(),
        models: models.iter().map(|m| m.to_string()).collect(),
        request_timeout_secs: 5,
    })
    .unwrap()
}

fn reply_body(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }]
    })
}

#[tokio::test]
async fn test_reply_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-a:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_json(json!({ "contents": [{ "parts": [{ "text": "hi" }] }] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply_body("hello!")))
        .expect(1)
        .mount(&server)
        .await;

    let reply = client(&server, &["gemini-a"]).reply("hi").await.unwrap();
    assert_eq!(reply, "hello!");

    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.url.query().is_none()));
}

#[tokio::test]
async fn test_falls_back_to_next_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-a:generateContent"))
        .respond_with(
            ResponseTemplate::new(503).set_body_json(json!({ "error": { "message": "overloaded" } })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-b:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply_body("from b")))
        .expect(1)
        .mount(&server)
        .await;

    let reply = client(&server, &["gemini-a", "gemini-b"]).reply("hi").await.unwrap();
    assert_eq!(reply, "from b");
}

#[tokio::test]
async fn test_all_models_fail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "error": { "message": "API key not valid" } })),
        )
        .expect(2)
        .mount(&server)
        .await;

    let err = client(&server, &["gemini-a", "gemini-b"]).reply("hi").await.unwrap_err();
    match err {
        LlmError::Api { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "API key not valid");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_error_without_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
        .mount(&server)
        .await;

    let err = client(&server, &["gemini-a"]).reply("hi").await.unwrap_err();
    assert!(err.to_string().contains("Gemini API failed"));
}

#[tokio::test]
async fn test_empty_candidates() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .mount(&server)
        .await;

    let reply = client(&server, &["gemini-a"]).reply("hi").await.unwrap();
    assert_eq!(reply, EMPTY_REPLY);
}

#[tokio::test]
async fn test_connection_error_hides_api_key() {
    // Bind then drop so nothing is listening on the port
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let client = GeminiClient::new(&LlmConfig {
        api_key: "test-key".to_string(),
        base_url,
        models: vec!["gemini-a".to_string()],
        request_timeout_secs: 5,
    })
    .unwrap();

    let err = client.reply("hi").await.unwrap_err();
    assert!(matches!(err, LlmError::Http(_)), "unexpected error: {err}");
    let rendered = format!("{err} {err:?}");
    assert!(!rendered.contains("test-key"), "key leaked: {rendered}");
    assert!(!rendered.contains("generateContent"), "url leaked: {rendered}");
}
