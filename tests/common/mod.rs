//! Common test utilities shared across integration tests

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use mitra_sandbox::{SandboxConfig, SandboxService, ScratchRoot};
use mitra_server::auth::JwtVerifier;
use mitra_server::llm::{LlmError, LlmResult, ReplyGenerator};
use mitra_server::rate_limit::RateLimiter;
use mitra_server::threads::{ChatMessage, InMemoryThreadStore, Thread, ThreadStore};
use mitra_server::{create_router, AppState};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

pub const TEST_SECRET: &str = "mitra-test-secret";

/// Setup logging for tests
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

/// Reply generator that always answers with the same text
pub struct StaticReply {
    pub text: String,
    pub calls: AtomicUsize,
}

impl StaticReply {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ReplyGenerator for StaticReply {
    async fn reply(&self, _prompt: &str) -> LlmResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.text.clone())
    }
}

/// Reply generator that always fails like an unreachable upstream
pub struct FailingReply;

#[async_trait]
impl ReplyGenerator for FailingReply {
    async fn reply(&self, _prompt: &str) -> LlmResult<String> {
        Err(LlmError::Api {
            status: 503,
            message: "model overloaded".to_string(),
        })
    }
}

/// Thread store whose every call fails like a lost database connection
pub struct UnavailableStore;

#[async_trait]
impl ThreadStore for UnavailableStore {
    async fn list(&self) -> anyhow::Result<Vec<Thread>> {
        anyhow::bail!("connection refused: db-secret-host:27017")
    }

    async fn get(&self, _thread_id: &str) -> anyhow::Result<Option<Thread>> {
        anyhow::bail!("connection refused: db-secret-host:27017")
    }

    async fn delete(&self, _thread_id: &str) -> anyhow::Result<bool> {
        anyhow::bail!("connection refused: db-secret-host:27017")
    }

    async fn append_turns(&self, _thread_id: &str, _turns: Vec<ChatMessage>) -> anyhow::Result<Thread> {
        anyhow::bail!("connection refused: db-secret-host:27017")
    }
}

/// A router wired with in-memory collaborators and a private scratch directory
pub struct TestApp {
    pub router: Router,
    pub scratch: TempDir,
    pub verifier: JwtVerifier,
    pub threads: Arc<InMemoryThreadStore>,
}

pub struct TestAppBuilder {
    replies: Arc<dyn ReplyGenerator>,
    store: Option<Arc<dyn ThreadStore>>,
    max_requests: u32,
    python_bin: Option<String>,
    javac_bin: Option<String>,
}

impl Default for TestAppBuilder {
    fn default() -> Self {
        Self {
            replies: Arc::new(StaticReply::new("Hello from the assistant")),
            store: None,
            max_requests: 1_000,
            python_bin: None,
            javac_bin: None,
        }
    }
}

impl TestAppBuilder {
    pub fn replies(mut self, replies: Arc<dyn ReplyGenerator>) -> Self {
        self.replies = replies;
        self
    }

    /// Serve threads from `store` instead of the inspectable in-memory one
    pub fn store(mut self, store: Arc<dyn ThreadStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn max_requests(mut self, max_requests: u32) -> Self {
        self.max_requests = max_requests;
        self
    }

    pub fn python_bin(mut self, bin: &str) -> Self {
        self.python_bin = Some(bin.to_string());
        self
    }

    pub fn javac_bin(mut self, bin: &str) -> Self {
        self.javac_bin = Some(bin.to_string());
        self
    }

    pub fn build(self) -> TestApp {
        let scratch = tempfile::tempdir().expect("Failed to create temp dir");

        let mut sandbox = SandboxConfig {
            scratch_root: ScratchRoot::new(scratch.path()),
            ..Default::default()
        };
        if let Some(bin) = self.python_bin {
            sandbox.python_bin = bin;
        }
        if let Some(bin) = self.javac_bin {
            sandbox.javac_bin = bin;
        }

        let threads = Arc::new(InMemoryThreadStore::new());
        let state = AppState {
            sandbox: Arc::new(SandboxService::new(sandbox)),
            verifier: Arc::new(JwtVerifier::new(TEST_SECRET)),
            rate_limiter: Arc::new(RateLimiter::new(
                Duration::from_secs(900),
                self.max_requests,
            )),
            threads: self.store.unwrap_or_else(|| threads.clone() as Arc<dyn ThreadStore>),
            replies: self.replies,
        };

        TestApp {
            router: create_router(state),
            scratch,
            verifier: JwtVerifier::new(TEST_SECRET),
            threads,
        }
    }
}

impl TestApp {
    pub fn builder() -> TestAppBuilder {
        TestAppBuilder::default()
    }

    pub fn token(&self) -> String {
        self.verifier
            .issue("test-user", Duration::from_secs(3600))
            .expect("Failed to issue token")
    }

    /// Send a request and decode the JSON body (Null when empty)
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Router is infallible");

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    /// POST `{code}` to `/api/execute/<language>` with a valid token
    pub async fn execute(&self, language: &str, code: &str) -> (StatusCode, Value) {
        let token = self.token();
        self.send(
            Method::POST,
            &format!("/api/execute/{}", language),
            Some(token.as_str()),
            Some(serde_json::json!({ "code": code })),
        )
        .await
    }

    /// Entries left in the scratch directory
    pub fn scratch_entries(&self) -> usize {
        std::fs::read_dir(self.scratch.path())
            .map(|dir| dir.count())
            .unwrap_or(0)
    }
}
