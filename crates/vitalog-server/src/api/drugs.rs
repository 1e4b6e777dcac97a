//! Drug authenticity API endpoints.
//!
//! Provides:
//! - GET /api/drugs/verify/{qr_code_id} - Look up a QR code in the registry

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use crate::AppState;
use crate::api::ApiError;

pub fn router() -> Router<AppState> {
    Router::new().route("/verify/{qr_code_id}", get(verify))
}

/// GET /api/drugs/verify/{qr_code_id}
///
/// 200 with the registered product when the code is known, 404 otherwise.
async fn verify(State(state): State<AppState>, Path(qr_code_id): Path<String>) -> impl IntoResponse {
    match state.drugs.verify(&qr_code_id).await {
        Ok(result) if result.authentic => (StatusCode::OK, Json(result)).into_response(),
        Ok(result) => (StatusCode::NOT_FOUND, Json(result)).into_response(),
        Err(e) => {
            tracing::error!("Failed to verify drug {}: {}", qr_code_id, e);
            ApiError::internal("Server error while verifying the product")
                .into_response_with(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
