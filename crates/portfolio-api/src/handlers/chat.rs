use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use validator::Validate;

use crate::models::chat::{ChatRequest, ChatResponse, SessionHistoryResponse};
use crate::services::conversation::ChatError;
use crate::services::ConversationManager;
use crate::utils::error::ApiError;

/// POST {prefix}/chat
///
/// The exchange runs on its own task. If this handler is dropped because the
/// client went away, the drop guard cancels the token and the task discards
/// the reply instead of recording it.
pub async fn chat_handler(
    State(manager): State<Arc<ConversationManager>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = payload?;
    request.validate()?;

    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();

    let task = tokio::spawn(async move { manager.handle(request, cancel).await });
    let outcome = task
        .await
        .map_err(|e| ChatError::Internal(format!("chat task failed: {}", e)))?;
    guard.disarm();

    let response = outcome?;
    debug!("Responding for session {}", response.session_id);
    Ok(Json(response))
}

/// GET {prefix}/chat/sessions/{session_id}
pub async fn session_history_handler(
    State(manager): State<Arc<ConversationManager>>,
    Path(session_id): Path<String>,
) -> Json<SessionHistoryResponse> {
    let messages = manager.history(&session_id).await;
    Json(SessionHistoryResponse {
        session_id,
        messages,
    })
}
