//! Chatbot API endpoints.
//!
//! Provides:
//! - POST /api/chatbot/query - Reply to a user message from the intent corpus

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::post};
use serde::Deserialize;

use vitalog_core::MatchError;

use crate::AppState;
use crate::api::ApiError;

pub fn router() -> Router<AppState> {
    Router::new().route("/query", post(query))
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatbotQueryRequest {
    #[serde(default)]
    pub message: Option<String>,
}

/// POST /api/chatbot/query
async fn query(
    State(state): State<AppState>,
    Json(request): Json<ChatbotQueryRequest>,
) -> impl IntoResponse {
    let message = request.message.unwrap_or_default();

    match state.matcher.reply(&message).await {
        Ok(reply) => (StatusCode::OK, Json(reply)).into_response(),
        Err(MatchError::InvalidInput(_)) => ApiError::bad_request("No message provided")
            .into_response_with(StatusCode::BAD_REQUEST),
        Err(e) => {
            tracing::error!("Failed to answer chatbot query: {}", e);
            ApiError::internal("Server error while processing the chatbot message")
                .into_response_with(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{read_json, state_with};
    use vitalog_core::{ChatReply, DEFAULT_APOLOGY, MemoryRuleRepository, NewIntentRule};

    fn request(message: Option<&str>) -> Json<ChatbotQueryRequest> {
        Json(ChatbotQueryRequest {
            message: message.map(str::to_string),
        })
    }

    #[tokio::test]
    async fn replies_from_matched_intent() {
        let repo = MemoryRuleRepository::new();
        repo.add_intent_rule(NewIntentRule::new(
            "greeting",
            &["hello"],
            &["Hello! How can I help?"],
        ));
        let (state, _dir) = state_with(repo).await;

        let response = query(State(state), request(Some("HELLO there")))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        let body: ChatReply = read_json(response).await;
        assert_eq!(body.response, "Hello! How can I help?");
    }

    #[tokio::test]
    async fn missing_message_is_bad_request() {
        let (state, _dir) = state_with(MemoryRuleRepository::new()).await;

        for message in [None, Some(""), Some("  ")] {
            let response = query(State(state.clone()), request(message))
                .await
                .into_response();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body: ApiError = read_json(response).await;
            assert_eq!(body.error, "bad_request");
        }
    }

    #[tokio::test]
    async fn unmatched_message_without_fallback_gets_apology() {
        let (state, _dir) = state_with(MemoryRuleRepository::new()).await;

        let response = query(State(state), request(Some("anything")))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        let body: ChatReply = read_json(response).await;
        assert_eq!(body.response, DEFAULT_APOLOGY);
    }

    #[tokio::test]
    async fn storage_failure_is_server_error() {
        let repo = MemoryRuleRepository::new();
        repo.fail_with("connection refused");
        let (state, _dir) = state_with(repo).await;

        let response = query(State(state), request(Some("hello")))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: ApiError = read_json(response).await;
        assert!(!body.message.contains("connection refused"));
    }
}
