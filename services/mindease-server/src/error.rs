//! Error types for the chat backend.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Reply sent with every 500 response.
pub const INTERNAL_FALLBACK_REPLY: &str =
    "I'm here with you. Something went wrong, but you can keep talking.";

/// Request-handling errors.
///
/// Completion failures never show up here; the completion client collapses
/// them into fallback replies. Unexpected failures surface as panics and are
/// answered with [`internal_fallback_response`].
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// API error payload.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ChatError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
        };
        let body = serde_json::json!({
            "success": false,
            "error": ApiError {
                code: code.to_string(),
                message: self.to_string(),
            }
        });
        (status, axum::Json(body)).into_response()
    }
}

/// The 500 response shown to users for any unexpected failure.
pub fn internal_fallback_response() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        axum::Json(serde_json::json!({ "reply": INTERNAL_FALLBACK_REPLY })),
    )
        .into_response()
}
