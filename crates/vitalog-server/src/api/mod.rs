//! HTTP API handlers.
//!
//! Mounted under `/api`:
//! - `/interactions` - drug interaction checks
//! - `/chatbot` - chatbot replies
//! - `/drugs` - QR authenticity verification

pub mod chatbot;
pub mod drugs;
pub mod interactions;

use axum::{Json, Router, http::StatusCode, response::IntoResponse, response::Response};
use serde::{Deserialize, Serialize};

use crate::AppState;

/// Create the main API router with all endpoints mounted.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/interactions", interactions::router())
        .nest("/chatbot", chatbot::router())
        .nest("/drugs", drugs::router())
}

/// Error response for API errors.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub message: String,
}

impl ApiError {
    fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("bad_request", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }

    pub fn into_response_with(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}
