//! Interaction API endpoints.
//!
//! Provides:
//! - POST /api/interactions/check - Check a medication list for known interactions

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::post};
use serde::Deserialize;

use crate::AppState;
use crate::api::ApiError;

pub fn router() -> Router<AppState> {
    Router::new().route("/check", post(check_interactions))
}

/// Request body for an interaction check. A missing list is treated as empty.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInteractionsRequest {
    #[serde(default)]
    pub medication_names: Vec<String>,
}

/// POST /api/interactions/check
///
/// Returns `{hasInteraction, warnings}` with at most one warning: the one for
/// the first interacting pair in list order.
async fn check_interactions(
    State(state): State<AppState>,
    Json(request): Json<CheckInteractionsRequest>,
) -> impl IntoResponse {
    match state.matcher.check_interactions(&request.medication_names).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => {
            tracing::error!("Failed to check interactions: {}", e);
            ApiError::internal("Server error while checking interactions")
                .into_response_with(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
