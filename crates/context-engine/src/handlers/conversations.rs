use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use crate::database::models::ConversationSummary;
use crate::services::ConversationOrchestrator;
use crate::utils::error::ApiError;

const DEFAULT_LIMIT: usize = 20;
const MAX_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationParams {
    pub user_id: Option<String>,
    pub limit: Option<usize>,
}

pub async fn list_conversations_handler(
    State(orchestrator): State<Arc<ConversationOrchestrator>>,
    Query(params): Query<ConversationParams>,
) -> Result<Json<Vec<ConversationSummary>>, ApiError> {
    let user_id = params
        .user_id
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("userId required".to_string()))?;
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let conversations = orchestrator.list_conversations(&user_id, limit).await?;
    Ok(Json(conversations))
}
