use axum::extract::FromRef;
use std::sync::Arc;

use crate::database::DbPool;
use crate::services::ConversationOrchestrator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ConversationOrchestrator>,
    /// None when running without a database (tests)
    pub db_pool: Option<DbPool>,
}

impl FromRef<AppState> for Arc<ConversationOrchestrator> {
    fn from_ref(state: &AppState) -> Self {
        state.orchestrator.clone()
    }
}
