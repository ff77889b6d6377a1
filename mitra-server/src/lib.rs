//! Mitra Server - HTTP API for the chat assistant
//!
//! Serves conversation threads, Gemini-backed replies and the code execution
//! endpoints backed by [`mitra_sandbox`].

pub mod auth;
pub mod config;
pub mod error;
pub mod llm;
pub mod rate_limit;
pub mod routes;
pub mod threads;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::{middleware, Router};
use mitra_sandbox::SandboxService;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::{require_auth, JwtVerifier, TokenVerifier};
use crate::config::ServerConfig;
use crate::llm::{GeminiClient, ReplyGenerator};
use crate::rate_limit::{enforce_rate_limit, RateLimiter};
use crate::routes::{chat, execute, health};
use crate::threads::{InMemoryThreadStore, ThreadStore};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub sandbox: Arc<SandboxService>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub rate_limiter: Arc<RateLimiter>,
    pub threads: Arc<dyn ThreadStore>,
    pub replies: Arc<dyn ReplyGenerator>,
}

impl AppState {
    /// Wire up the production collaborators from configuration
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let replies = GeminiClient::new(&config.llm).context("Failed to create Gemini client")?;

        Ok(Self {
            sandbox: Arc::new(SandboxService::new(config.sandbox.to_sandbox_config()?)),
            verifier: Arc::new(JwtVerifier::new(&config.auth.jwt_secret)),
            rate_limiter: Arc::new(RateLimiter::new(
                Duration::from_secs(config.rate_limit.window_secs),
                config.rate_limit.max_requests,
            )),
            threads: Arc::new(InMemoryThreadStore::new()),
            replies: Arc::new(replies),
        })
    }
}

/// API routes without transport layers
pub fn create_router(state: AppState) -> Router {
    // Auth runs first so rejected callers never consume the rate budget
    let execute = Router::new()
        .route("/capabilities", get(execute::capabilities))
        .route("/:language", post(execute::execute))
        .route_layer(middleware::from_fn_with_state(state.clone(), enforce_rate_limit))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let api = Router::new()
        .nest("/execute", execute)
        .route("/thread", get(chat::list_threads))
        .route(
            "/thread/:thread_id",
            get(chat::get_thread).delete(chat::delete_thread),
        )
        .route("/chat", post(chat::chat));

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", api)
        .with_state(state)
}

/// Full application: routes plus request tracing and CORS
pub fn build_app(state: AppState, config: &ServerConfig) -> Result<Router> {
    let cors = match config.server.cors_origin.as_deref() {
        Some(origin) => CorsLayer::new().allow_origin(
            HeaderValue::from_str(origin)
                .with_context(|| format!("Invalid CORS origin: {}", origin))?,
        ),
        None => CorsLayer::new().allow_origin(Any),
    }
    .allow_methods(Any)
    .allow_headers(Any);

    Ok(create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http()))
}

/// Serve `app` until Ctrl-C
pub async fn start_server(listener: tokio::net::TcpListener, app: Router) -> Result<()> {
    let bind_addr = listener
        .local_addr()
        .context("Failed to obtain server bind address")?;
    info!("Server is running on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

/// Install the global tracing subscriber. `RUST_LOG` wins over `default_level`.
pub fn init_logging(default_level: &str, format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if format.eq_ignore_ascii_case("json") {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if let Err(e) = result {
        eprintln!("Logging already initialized: {}", e);
    }
}
