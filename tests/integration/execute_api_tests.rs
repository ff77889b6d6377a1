//! Integration tests for the `/api/execute` routes
//!
//! These drive the full router (auth, rate limiting, coordinator, V8 backend)
//! in-process through `tower::ServiceExt::oneshot`.

use axum::http::{Method, StatusCode};
use mitra_tests::common::{setup_test_logging, TestApp};
use serde_json::json;

#[tokio::test]
async fn test_javascript_console_output() {
    setup_test_logging();
    let app = TestApp::builder().build();

    let (status, body) = app.execute("javascript", "console.log(2+2)").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "success": true, "output": "4", "result": "", "executionTime": "< 5s" })
    );
}

#[tokio::test]
async fn test_javascript_return_value() {
    let app = TestApp::builder().build();

    let (status, body) = app.execute("javascript", "[1, 2, 3].map(x => x * 10).join('-')").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["result"], "10-20-30");
}

#[tokio::test]
async fn test_javascript_error_is_ok_response() {
    let app = TestApp::builder().build();

    let (status, body) = app.execute("javascript", "throw new Error('kaboom')").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("kaboom"));
    assert!(body.get("result").is_none());
}

#[tokio::test]
async fn test_missing_code_is_bad_request() {
    let app = TestApp::builder().build();
    let token = app.token();

    for body in [json!({}), json!({ "code": "" }), json!({ "code": "   " })] {
        let (status, response) = app
            .send(Method::POST, "/api/execute/python", Some(token.as_str()), Some(body))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response, json!({ "error": "Code is required" }));
    }

    // A body that is not JSON at all is treated the same way
    let (status, _) = app
        .send(Method::POST, "/api/execute/javascript", Some(token.as_str()), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.scratch_entries(), 0);
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let app = TestApp::builder().build();

    let (status, body) = app
        .send(
            Method::POST,
            "/api/execute/javascript",
            None,
            Some(json!({ "code": "1" })),
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("No token"));
}

#[tokio::test]
async fn test_invalid_token_is_unauthorized() {
    let app = TestApp::builder().build();

    let (status, body) = app
        .send(
            Method::POST,
            "/api/execute/javascript",
            Some("not-a-jwt"),
            Some(json!({ "code": "1" })),
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid or expired token.");
}

#[tokio::test]
async fn test_unknown_language_not_found() {
    let app = TestApp::builder().build();

    let (status, body) = app.execute("ruby", "puts 1").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "Language not found: ruby" }));
}

#[tokio::test]
async fn test_rate_limit_applies_to_execution() {
    let app = TestApp::builder().max_requests(2).build();

    for _ in 0..2 {
        let (status, _) = app.execute("javascript", "1").await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = app.execute("javascript", "1").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_unauthenticated_calls_do_not_consume_budget() {
    let app = TestApp::builder().max_requests(1).build();

    for _ in 0..3 {
        let (status, _) = app
            .send(
                Method::POST,
                "/api/execute/javascript",
                None,
                Some(json!({ "code": "1" })),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let (status, _) = app.execute("javascript", "1").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_capabilities_report_javascript() {
    let app = TestApp::builder()
        .python_bin("no-such-python-mitra")
        .javac_bin("no-such-javac-mitra")
        .build();
    let token = app.token();

    let (status, body) = app
        .send(Method::GET, "/api/execute/capabilities", Some(token.as_str()), None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "javascript": true, "python": false, "java": false }));
}

#[tokio::test]
async fn test_missing_python_short_circuits() {
    let app = TestApp::builder().python_bin("no-such-python-mitra").build();

    let (status, body) = app.execute("python", "print('hi')").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(
        body["error"],
        "Python runtime is not installed on the server. Install python3 to run Python code."
    );
    assert_eq!(app.scratch_entries(), 0);
}

#[tokio::test]
async fn test_missing_jdk_short_circuits() {
    let app = TestApp::builder().javac_bin("no-such-javac-mitra").build();

    let (status, body) = app
        .execute("java", "public class Main { public static void main(String[] a) {} }")
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("is not installed on the server"));
    assert_eq!(app.scratch_entries(), 0);
}

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::builder().build();

    let (status, body) = app.send(Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}
