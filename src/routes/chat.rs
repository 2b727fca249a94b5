use axum::{Json, extract::State};
use base64::{Engine, engine::general_purpose::STANDARD};

use crate::{
    error::AppError,
    message::{ChatRequest, ChatResponse},
    state::SharedState,
};

pub async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let trimmed = payload.message.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest("Message cannot be empty".to_string()));
    }

    let session_id = payload.session();
    tracing::info!(session_id, message = trimmed, "/api/chat");

    let reply = state.chat.generate_reply(session_id, trimmed).await?;
    let audio = reply.audio.as_deref().map(|bytes| STANDARD.encode(bytes)).unwrap_or_default();

    Ok(Json(ChatResponse {
        message: reply.text,
        expression: reply.expression,
        audio: Some(audio),
    }))
}
