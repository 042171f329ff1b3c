use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use std::sync::Arc;
use tracing::info;

use crate::models::chat::{QueryRequest, QueryResponse};
use crate::services::ConversationOrchestrator;
use crate::utils::error::ApiError;

pub async fn query_handler(
    State(orchestrator): State<Arc<ConversationOrchestrator>>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    if request.user_id.trim().is_empty() {
        return Err(ApiError::BadRequest("userId required".to_string()));
    }
    if request.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message required".to_string()));
    }

    info!(
        "Query request: user={}, has_conversation={}",
        request.user_id,
        request.conversation_id.is_some()
    );

    let response = orchestrator.process(request).await?;
    Ok(Json(response))
}
