use super::common::success_response;
use crate::{auth::AuthRouterExt, errors::ServiceError, ApiResponse, AppState};
use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChatRequest {
    #[schema(example = "What sells best during Diwali?")]
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ChatReply {
    pub reply: String,
}

pub fn assistant_routes() -> Router<AppState> {
    Router::new()
        .route("/assistant/chat", post(chat))
        .with_auth()
}

#[utoipa::path(
    post,
    path = "/api/v1/assistant/chat",
    summary = "Ask the retail assistant",
    description = "Always answers with text; upstream failures are described in the reply.",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Assistant reply", body = ApiResponse<ChatReply>),
        (status = 400, description = "Empty message", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "assistant"
)]
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ApiResponse<ChatReply>>, ServiceError> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(ServiceError::BadRequest("Message is required".to_string()));
    }

    debug!(len = message.len(), "assistant chat");
    let reply = state.services.assistant.reply(message).await;
    Ok(success_response(ChatReply { reply }))
}
