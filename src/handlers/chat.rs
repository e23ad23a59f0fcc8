use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::ApiError;
use crate::middleware::auth::{auth_middleware, AuthUser};
use crate::models::chat::{ChatRequest, ChatResponse, CreateSessionRequest, Sender};
use crate::openrouter_client::{build_prompt, SYSTEM_INSTRUCTIONS};
use crate::AppState;

/// Fixed reply when no timesheet has been uploaded yet; the model is not
/// called for it.
const NO_DATA_ANSWER: &str =
    "I'm sorry, but the timesheet data is empty. Please upload a file first.";

pub fn chat_routes() -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/chat/sessions", get(list_sessions).post(create_session))
        .route(
            "/chat/sessions/:chat_id",
            get(get_session).delete(delete_session),
        )
        .route("/chat/sessions/:chat_id/validate", get(validate_session))
        .layer(axum::middleware::from_fn(auth_middleware))
}

async fn list_sessions(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    let sessions = state.chats.list_sessions(&user.username).await?;
    Ok(Json(json!({ "sessions": sessions })))
}

async fn create_session(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    payload: Option<Json<CreateSessionRequest>>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let session_name = payload.and_then(|Json(p)| p.session_name);
    let session = state
        .chats
        .create_session(&user.username, session_name)
        .await?;

    tracing::info!(username = %user.username, chat_id = %session.chat_id, "chat session created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "chat_id": session.chat_id,
            "session_name": session.session_name,
            "created_at": session.created_at,
            "message": "Chat session created successfully",
        })),
    ))
}

async fn get_session(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(chat_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let messages = state.chats.get_messages(&chat_id, &user.username).await?;
    Ok(Json(json!({ "messages": messages })))
}

/// Ownership probe: 200 with session metadata for the owner, 404 otherwise.
async fn validate_session(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(chat_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let session = state
        .chats
        .find_session(&chat_id, &user.username)
        .await?
        .ok_or(ApiError::NotFound("Chat session not found"))?;

    Ok(Json(json!({
        "valid": true,
        "chat_id": session.chat_id,
        "session_name": session.session_name,
        "username": session.username,
    })))
}

async fn delete_session(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(chat_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.chats.delete_session(&chat_id, &user.username).await?;

    tracing::info!(username = %user.username, chat_id = %chat_id, "chat session deleted");

    Ok(Json(json!({ "message": "Chat session deleted successfully" })))
}

/// Main chat endpoint: validate ownership, build a bounded prompt from the
/// current timesheet, get the model's answer, and record both sides of the
/// exchange.
async fn chat(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let query = payload
        .query
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("Query is required.".to_string()))?;
    let chat_id = payload
        .chat_id
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("Chat ID is required.".to_string()))?;

    state
        .chats
        .find_session(&chat_id, &user.username)
        .await?
        .ok_or(ApiError::NotFound("Chat session not found"))?;

    let timesheet = state.timesheets.fetch_all().await?;

    let answer = if timesheet.is_empty() {
        NO_DATA_ANSWER.to_string()
    } else {
        let client = state
            .model_client
            .as_ref()
            .ok_or_else(|| ApiError::Internal("OPENROUTER_API_KEY not configured".to_string()))?;
        let prompt = build_prompt(&query, &timesheet.preview());
        client.complete(SYSTEM_INSTRUCTIONS, &prompt).await?
    };

    // The model call is done before any mutation, so nothing here holds a
    // store connection while waiting on it.
    state
        .chats
        .append_message(&chat_id, &user.username, Sender::User, &query)
        .await?;
    if let Err(e) = state
        .chats
        .append_message(&chat_id, &user.username, Sender::Bot, &answer)
        .await
    {
        tracing::error!(
            chat_id = %chat_id,
            "user message stored but bot reply append failed: {}", e
        );
        return Err(e);
    }

    Ok(Json(ChatResponse { answer }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_data_answer_matches_the_fixed_text() {
        assert!(NO_DATA_ANSWER.contains("timesheet data is empty"));
    }

    #[test]
    fn chat_request_tolerates_missing_fields() {
        let payload: ChatRequest = serde_json::from_str("{}").unwrap();
        assert!(payload.query.is_none());
        assert!(payload.chat_id.is_none());

        let payload: ChatRequest =
            serde_json::from_str(r#"{"query":"hi","chat_id":"c1"}"#).unwrap();
        assert_eq!(payload.query.as_deref(), Some("hi"));
        assert_eq!(payload.chat_id.as_deref(), Some("c1"));
    }
}
