//! Global fixed-window rate limiting for the execution routes

use crate::error::{ApiError, ApiResult};
use crate::AppState;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

struct Window {
    started: Instant,
    count: u32,
}

/// Allows `max_requests` per `window` across all callers
pub struct RateLimiter {
    window: Duration,
    max_requests: u32,
    current: Mutex<Window>,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            current: Mutex::new(Window {
                started: Instant::now(),
                count: 0,
            }),
        }
    }

    /// Count one request; `false` once the window is exhausted
    pub async fn try_acquire(&self) -> bool {
        let mut current = self.current.lock().await;
        if current.started.elapsed() >= self.window {
            current.started = Instant::now();
            current.count = 0;
        }
        if current.count >= self.max_requests {
            return false;
        }
        current.count += 1;
        true
    }
}

pub async fn enforce_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    if !state.rate_limiter.try_acquire().await {
        tracing::warn!(path = %request.uri().path(), "Rate limit exceeded");
        return Err(ApiError::RateLimited);
    }
    Ok(next.run(request).await)
}
