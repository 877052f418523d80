//! Mapping of room errors to HTTP responses.

use crate::metrics;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use parlor_core::ChatError;
use serde_json::json;
use tracing::error;

/// Error returned by HTTP handlers.
#[derive(Debug)]
pub enum ApiError {
    /// A room operation failed.
    Chat(ChatError),
    /// The request body exceeded the configured limit.
    PayloadTooLarge,
}

impl From<ChatError> for ApiError {
    fn from(e: ChatError) -> Self {
        ApiError::Chat(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        // Malformed, mistyped or incomplete bodies are all validation
        // failures; only an oversized body keeps its own status.
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::Chat(ChatError::Validation(rejection.body_text()))
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Chat(e) => {
                metrics::record_error(e);
                match e {
                    ChatError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
                    ChatError::Conflict(_) => (StatusCode::CONFLICT, e.to_string()),
                    ChatError::NotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
                    ChatError::Store(inner) => {
                        error!(error = %inner, "Store failure");
                        (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            "Internal server error".to_string(),
                        )
                    }
                }
            }
            ApiError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "Request body too large".to_string(),
            ),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
