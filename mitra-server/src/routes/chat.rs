//! Threads and chat turns

use crate::error::{ApiError, ApiResult};
use crate::threads::{ChatMessage, Role, Thread};
use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBody {
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

pub async fn list_threads(State(state): State<AppState>) -> ApiResult<Json<Vec<Thread>>> {
    let threads = state
        .threads
        .list()
        .await
        .map_err(|e| ApiError::internal("An error occurred while fetching the thread.", e))?;
    Ok(Json(threads))
}

pub async fn get_thread(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> ApiResult<Json<Thread>> {
    state
        .threads
        .get(&thread_id)
        .await
        .map_err(|e| ApiError::internal("An error occurred while fetching the thread.", e))?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Thread not found.".to_string()))
}

pub async fn delete_thread(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let deleted = state
        .threads
        .delete(&thread_id)
        .await
        .map_err(|e| ApiError::internal("An error occurred while deleting the thread.", e))?;

    if !deleted {
        return Err(ApiError::NotFound("Thread not found".to_string()));
    }
    tracing::info!(thread_id = %thread_id, "Thread deleted");
    Ok(Json(json!({ "success": "Thread deleted successfully" })))
}

/// `POST /api/chat`
///
/// The user turn is only stored together with the assistant's reply, so a
/// failed generation leaves the thread untouched.
pub async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let (thread_id, message) = match body {
        Ok(Json(ChatBody {
            thread_id: Some(thread_id),
            message: Some(message),
        })) if !thread_id.is_empty() && !message.is_empty() => (thread_id, message),
        _ => return Err(ApiError::BadRequest("missing required fields".to_string())),
    };

    let reply = state
        .replies
        .reply(&message)
        .await
        .map_err(|e| ApiError::upstream("An error occurred while saving the message.", e))?;

    state
        .threads
        .append_turns(
            &thread_id,
            vec![
                ChatMessage::new(Role::User, message),
                ChatMessage::new(Role::Assistant, reply.clone()),
            ],
        )
        .await
        .map_err(|e| ApiError::internal("An error occurred while saving the message.", e))?;

    Ok(Json(json!({ "reply": reply })))
}
