//! `/api/execute/*`: run snippets and report toolchain availability

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::{Extension, Json};
use mitra_sandbox::{CapabilitySet, ExecutionRequest, ExecutionResult, Language};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct ExecuteBody {
    #[serde(default)]
    pub code: Option<String>,
}

/// `POST /api/execute/:language`
///
/// Failing programs are still `200 OK` with `success: false`.
pub async fn execute(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(language): Path<String>,
    body: Result<Json<ExecuteBody>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let language: Language = language.parse()?;
    tracing::debug!(user_id = %user.user_id, language = %language, "Execution requested");

    // An unreadable body is treated like a body without `code`
    let code = body.ok().and_then(|Json(body)| body.code).unwrap_or_default();

    let result = state
        .sandbox
        .execute(ExecutionRequest::new(language, code))
        .await?;

    Ok(Json(response_body(language, &result)))
}

/// `GET /api/execute/capabilities`
pub async fn capabilities(State(state): State<AppState>) -> Json<CapabilitySet> {
    Json(state.sandbox.capabilities().await)
}

fn response_body(language: Language, result: &ExecutionResult) -> Value {
    if !result.success {
        return json!({
            "success": false,
            "error": result.error_message.as_deref().unwrap_or("Code execution failed"),
            "output": result.output,
        });
    }

    let mut body = json!({
        "success": true,
        "output": result.output,
        "executionTime": result.execution_time_label,
    });
    if language == Language::JavaScript {
        body["result"] = json!(result.return_value.as_deref().unwrap_or(""));
    }
    body
}
