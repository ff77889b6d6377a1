//! Error types for the HTTP API

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use mitra_sandbox::SandboxError;
use serde_json::json;
use thiserror::Error;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Too many requests, please try again later.")]
    RateLimited,

    /// Remote dependency failed; the detail is logged, `public` is returned
    #[error("Upstream error: {detail}")]
    Upstream { public: String, detail: String },

    /// Server-side failure; the detail is logged, `public` is returned
    #[error("Internal error: {detail}")]
    Internal { public: String, detail: String },
}

impl ApiError {
    pub fn internal(public: impl Into<String>, detail: impl ToString) -> Self {
        Self::Internal {
            public: public.into(),
            detail: detail.to_string(),
        }
    }

    pub fn upstream(public: impl Into<String>, detail: impl ToString) -> Self {
        Self::Upstream {
            public: public.into(),
            detail: detail.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Upstream { .. } => StatusCode::BAD_GATEWAY,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<SandboxError> for ApiError {
    fn from(err: SandboxError) -> Self {
        match err {
            SandboxError::MissingCode => Self::BadRequest(err.to_string()),
            SandboxError::UnknownLanguage(_) => Self::NotFound(err.to_string()),
            other => Self::internal("Code execution failed", other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Auth and rate-limit rejections use the `{success, message}` envelope
        let body = match &self {
            Self::Unauthorized(message) => json!({ "success": false, "message": message }),
            Self::RateLimited => json!({ "success": false, "message": self.to_string() }),
            Self::Upstream { public, detail } | Self::Internal { public, detail } => {
                tracing::error!(status = status.as_u16(), error = %detail, "Request failed");
                json!({ "error": public })
            }
            Self::BadRequest(message) | Self::NotFound(message) => json!({ "error": message }),
        };

        (status, Json(body)).into_response()
    }
}
