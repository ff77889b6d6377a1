//! Integration tests for thread and chat routes

use axum::http::{Method, StatusCode};
use mitra_server::threads::ThreadStore;
use mitra_tests::common::{FailingReply, StaticReply, TestApp, UnavailableStore};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[tokio::test]
async fn test_chat_creates_thread() {
    let replies = Arc::new(StaticReply::new("Hi! How can I help?"));
    let app = TestApp::builder().replies(replies.clone()).build();

    let (status, body) = app
        .send(
            Method::POST,
            "/api/chat",
            None,
            Some(json!({ "threadId": "t-1", "message": "hello" })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "reply": "Hi! How can I help?" }));
    assert_eq!(replies.calls.load(Ordering::SeqCst), 1);

    let (status, thread) = app.send(Method::GET, "/api/thread/t-1", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(thread["threadId"], "t-1");
    assert_eq!(thread["title"], "hello");
    assert_eq!(thread["messages"][0]["role"], "user");
    assert_eq!(thread["messages"][1]["role"], "assistant");
    assert_eq!(thread["messages"][1]["content"], "Hi! How can I help?");
}

#[tokio::test]
async fn test_chat_appends_to_existing_thread() {
    let app = TestApp::builder().build();

    for message in ["first", "second"] {
        let (status, _) = app
            .send(
                Method::POST,
                "/api/chat",
                None,
                Some(json!({ "threadId": "t-1", "message": message })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let thread = app.threads.get("t-1").await.unwrap().unwrap();
    assert_eq!(thread.title, "first");
    assert_eq!(thread.messages.len(), 4);
}

#[tokio::test]
async fn test_chat_missing_fields() {
    let app = TestApp::builder().build();

    for body in [
        json!({ "threadId": "t-1" }),
        json!({ "message": "hello" }),
        json!({ "threadId": "", "message": "hello" }),
    ] {
        let (status, response) = app.send(Method::POST, "/api/chat", None, Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response, json!({ "error": "missing required fields" }));
    }
}

#[tokio::test]
async fn test_failed_reply_stores_nothing() {
    let app = TestApp::builder().replies(Arc::new(FailingReply)).build();

    let (status, body) = app
        .send(
            Method::POST,
            "/api/chat",
            None,
            Some(json!({ "threadId": "t-1", "message": "hello" })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "An error occurred while saving the message.");
    assert!(app.threads.get("t-1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_list_and_delete_threads() {
    let app = TestApp::builder().build();

    for id in ["a", "b"] {
        app.send(
            Method::POST,
            "/api/chat",
            None,
            Some(json!({ "threadId": id, "message": "hi" })),
        )
        .await;
    }

    let (status, threads) = app.send(Method::GET, "/api/thread", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = threads
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["threadId"].as_str().unwrap())
        .collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&"a") && ids.contains(&"b"));

    let (status, body) = app.send(Method::DELETE, "/api/thread/a", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": "Thread deleted successfully" }));

    let (status, body) = app.send(Method::DELETE, "/api/thread/a", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "Thread not found" }));
}

#[tokio::test]
async fn test_unknown_thread() {
    let app = TestApp::builder().build();

    let (status, body) = app.send(Method::GET, "/api/thread/missing", None, None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "Thread not found." }));
}

#[tokio::test]
async fn test_store_failure_is_internal_error() {
    let app = TestApp::builder().store(Arc::new(UnavailableStore)).build();

    let (status, body) = app.send(Method::GET, "/api/thread", None, None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "An error occurred while fetching the thread." }));

    let (status, body) = app
        .send(
            Method::POST,
            "/api/chat",
            None,
            Some(json!({ "threadId": "t-1", "message": "hello" })),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "An error occurred while saving the message." }));
}
