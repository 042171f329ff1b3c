use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use context_engine::config::Settings;
use context_engine::database::{DbPool, Repository};
use context_engine::handlers::build_router;
use context_engine::services::{ConversationOrchestrator, EmbeddingService, LlmService};
use context_engine::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,context_engine=debug".to_string()),
        )
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .init();

    info!("Starting Context Engine...");

    // Load configuration
    let settings = Settings::load()?;
    info!("Configuration loaded");

    // Initialize database pool
    let db_pool = DbPool::new(&settings.database).await?;
    info!("Database connection established");

    let repository = Arc::new(Repository::new(db_pool.clone()));
    repository.init_schema(settings.embedding.dimension).await?;

    // Initialize services
    let embedding_service = Arc::new(EmbeddingService::new(
        settings.embedding.clone(),
        settings.gemini.api_key.clone(),
    ));

    let llm_service = Arc::new(LlmService::new(
        settings.llm.clone(),
        settings.gemini.api_key.clone(),
    ));

    let orchestrator = Arc::new(ConversationOrchestrator::new(
        embedding_service,
        repository,
        llm_service,
        settings.pipeline.clone(),
        settings.prompts.system_prompt.clone(),
    ));

    let app = build_router(AppState {
        orchestrator,
        db_pool: Some(db_pool),
    });

    // Server address
    let addr = SocketAddr::from((
        settings.server.host.parse::<std::net::IpAddr>()?,
        settings.server.port,
    ));

    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
