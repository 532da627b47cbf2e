//! HTTP API routes.

use crate::chat::{ChatService, ReplyKind};
use crate::error::ChatError;
use axum::{
    body::Bytes,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use mindease_common::logging::{generate_request_id, preview};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

/// Application state shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub chat: ChatService,
}

impl AppState {
    pub fn new(chat: ChatService) -> Self {
        Self { chat }
    }
}

/// Build the application router (no middleware).
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/chat", post(chat))
        .route("/reset", post(reset))
        .with_state(state)
}

// ============ Health Check ============

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    backend: &'static str,
    ai_configured: bool,
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        backend: "running",
        ai_configured: state.chat.is_ai_configured(),
    })
}

// ============ Chat ============

#[derive(Debug, Default, Deserialize)]
struct ChatBody {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatResponseBody {
    reply: String,
}

/// Body is decoded as JSON whatever the declared content type.
async fn chat(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ChatError> {
    let body: ChatBody = serde_json::from_slice(&body)
        .map_err(|e| ChatError::InvalidRequest(format!("body must be a JSON object: {e}")))?;
    let message = body.message.unwrap_or_default();

    let span = tracing::info_span!("chat", request_id = %generate_request_id());
    let reply = async move {
        tracing::info!(message_len = message.len(), "Chat request received");
        tracing::debug!(message = %preview(message.trim(), 100), "Chat message");

        let reply = state.chat.reply(&message).await;
        if reply.kind == ReplyKind::Crisis {
            tracing::info!("Replied with crisis resources");
        }
        reply
    }
    .instrument(span)
    .await;

    Ok(Json(ChatResponseBody { reply: reply.text }))
}

// ============ Reset ============

async fn reset(State(state): State<AppState>) -> impl IntoResponse {
    state.chat.reset();
    Json(serde_json::json!({ "status": "success" }))
}
