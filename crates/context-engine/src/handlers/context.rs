use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use crate::services::context::ContextPreview;
use crate::services::ConversationOrchestrator;
use crate::utils::error::ApiError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextParams {
    pub user_id: Option<String>,
    pub message: Option<String>,
}

/// Shows the context the pipeline would inject for `message`,
/// without persisting anything or calling the model.
pub async fn context_handler(
    State(orchestrator): State<Arc<ConversationOrchestrator>>,
    Query(params): Query<ContextParams>,
) -> Result<Json<ContextPreview>, ApiError> {
    let user_id = params
        .user_id
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("userId required".to_string()))?;
    let message = params
        .message
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("message required".to_string()))?;

    let preview = orchestrator.preview(&user_id, &message).await?;
    Ok(Json(preview))
}
