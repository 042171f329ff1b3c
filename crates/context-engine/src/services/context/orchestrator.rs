//! Request pipeline and the collaborator traits it depends on.

use anyhow::Result;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::PipelineConfig;
use crate::database::models::ConversationSummary;
use crate::models::chat::{new_conversation_id, Message, QueryRequest, QueryResponse};

use super::frame::{excerpt, ContextFrameSynthesizer};
use super::intent::IntentClassifier;
use super::scorer::RelevanceScorer;
use super::types::{
    context_summary, CandidatePreview, ContextPreview, NormalizedQuery, ScoredCandidate,
};

/// Trait for embedding service
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Trait for conversation/message persistence and similarity search
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MessageStore: Send + Sync {
    /// Prior user-authored messages of `user_id`, most similar first.
    async fn find_similar_messages(
        &self,
        user_id: &str,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<Message>>;

    /// The `limit` most recent messages of a conversation, oldest first.
    async fn get_recent_messages(&self, conversation_id: &str, limit: usize) -> Result<Vec<Message>>;

    async fn create_conversation(&self, user_id: &str, conversation_id: &str, title: &str) -> Result<()>;

    async fn insert_message(&self, message: &Message) -> Result<()>;

    async fn list_conversations(&self, user_id: &str, limit: usize) -> Result<Vec<ConversationSummary>>;
}

/// Trait for LLM service
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    async fn invoke(
        &self,
        system_prompt: &str,
        history: &[Message],
        context_frame: &str,
        new_message: &str,
    ) -> Result<String>;
}

/// Step at which a request was aborted. Writes committed before the
/// failing step are left in place.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("embedding generation failed: {0:#}")]
    Embedding(anyhow::Error),

    #[error("candidate retrieval failed: {0:#}")]
    Retrieval(anyhow::Error),

    #[error("conversation creation failed: {0:#}")]
    Conversation(anyhow::Error),

    #[error("history loading failed: {0:#}")]
    History(anyhow::Error),

    #[error("message persistence failed: {0:#}")]
    Persist(anyhow::Error),

    #[error("model invocation failed: {0:#}")]
    Model(anyhow::Error),

    #[error("conversation listing failed: {0:#}")]
    Listing(anyhow::Error),
}

/// Output of the read-only half of the pipeline
struct AssembledContext {
    query: NormalizedQuery,
    embedding: Vec<f32>,
    ranked: Vec<ScoredCandidate>,
    frame: String,
}

pub struct ConversationOrchestrator {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    message_store: Arc<dyn MessageStore>,
    llm_provider: Arc<dyn LlmProvider>,
    scorer: RelevanceScorer,
    synthesizer: ContextFrameSynthesizer,
    config: PipelineConfig,
    system_prompt: String,
}

impl ConversationOrchestrator {
    pub fn new(
        embedding_provider: Arc<dyn EmbeddingProvider>,
        message_store: Arc<dyn MessageStore>,
        llm_provider: Arc<dyn LlmProvider>,
        config: PipelineConfig,
        system_prompt: String,
    ) -> Self {
        Self {
            embedding_provider,
            message_store,
            llm_provider,
            scorer: RelevanceScorer::new(config.scoring),
            synthesizer: ContextFrameSynthesizer::new(config.frame),
            config,
            system_prompt,
        }
    }

    pub async fn process(&self, request: QueryRequest) -> Result<QueryResponse, PipelineError> {
        let QueryRequest {
            user_id,
            message,
            conversation_id,
        } = request;

        info!(
            "Query received: user={}, conversation={:?}, message_len={}",
            user_id,
            conversation_id,
            message.len()
        );

        let AssembledContext {
            query,
            embedding,
            ranked,
            frame,
        } = self.assemble_context(&user_id, &message).await?;

        let conversation_id = self
            .resolve_conversation(&user_id, conversation_id, &message)
            .await?;

        let history = self
            .message_store
            .get_recent_messages(&conversation_id, self.config.history_limit)
            .await
            .map_err(PipelineError::History)?;
        debug!("Loaded {} history messages", history.len());

        let user_message = Message::user(&conversation_id, &message, embedding);
        self.message_store
            .insert_message(&user_message)
            .await
            .map_err(PipelineError::Persist)?;
        debug!("Persisted user message {}", user_message.id);

        let answer = self
            .llm_provider
            .invoke(&self.system_prompt, &history, &frame, &message)
            .await
            .map_err(|e| {
                error!("Model invocation failed for conversation {}: {:#}", conversation_id, e);
                PipelineError::Model(e)
            })?;

        let assistant_message = Message::assistant(&conversation_id, &answer);
        self.message_store
            .insert_message(&assistant_message)
            .await
            .map_err(PipelineError::Persist)?;

        let summary = context_summary(ranked.len(), query.intent);
        info!(
            "Query answered: conversation={}, answer_len={}, {}",
            conversation_id,
            answer.len(),
            summary
        );

        Ok(QueryResponse {
            answer,
            conversation_id,
            context_summary: summary,
        })
    }

    /// Classifies, retrieves, ranks and synthesizes without writing anything
    /// or calling the model.
    pub async fn preview(&self, user_id: &str, message: &str) -> Result<ContextPreview, PipelineError> {
        let AssembledContext {
            query,
            ranked,
            frame,
            ..
        } = self.assemble_context(user_id, message).await?;

        let excerpt_chars = self.config.frame.excerpt_chars;
        let candidates = ranked
            .iter()
            .map(|c| CandidatePreview {
                message_id: c.message.id.clone(),
                conversation_id: c.message.conversation_id.clone(),
                score: c.score,
                excerpt: excerpt(&c.message.content, excerpt_chars).to_string(),
            })
            .collect();

        Ok(ContextPreview {
            intent: query.intent,
            tags: query.tags,
            candidates,
            context_frame: frame,
            context_summary: context_summary(ranked.len(), query.intent),
        })
    }

    pub async fn list_conversations(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationSummary>, PipelineError> {
        self.message_store
            .list_conversations(user_id, limit)
            .await
            .map_err(PipelineError::Listing)
    }

    /// Scores every candidate, then keeps the best ones above the threshold.
    /// The sort is stable: equal scores keep their similarity order.
    pub fn rank(&self, candidates: Vec<Message>, query: &NormalizedQuery) -> Vec<ScoredCandidate> {
        let mut scored: Vec<ScoredCandidate> = candidates
            .into_iter()
            .map(|message| {
                let score = self.scorer.score(&message, query);
                ScoredCandidate { message, score }
            })
            .collect();

        scored.sort_by(|a, b| b.score.cmp(&a.score));

        scored
            .into_iter()
            .filter(|c| c.score > self.config.relevance_threshold)
            .take(self.config.max_context_messages)
            .collect()
    }

    async fn assemble_context(
        &self,
        user_id: &str,
        message: &str,
    ) -> Result<AssembledContext, PipelineError> {
        let query = IntentClassifier::classify(message);
        debug!("Classified intent={} tags={:?}", query.intent, query.tags);

        let embedding = self
            .embedding_provider
            .embed(&query.text)
            .await
            .map_err(|e| {
                error!("Embedding failed for user {}: {:#}", user_id, e);
                PipelineError::Embedding(e)
            })?;

        let candidates = self
            .message_store
            .find_similar_messages(user_id, &embedding, self.config.retrieval_limit)
            .await
            .map_err(PipelineError::Retrieval)?;
        let retrieved = candidates.len();

        let ranked = self.rank(candidates, &query);
        debug!(
            "Ranked candidates: retrieved={}, kept={}",
            retrieved,
            ranked.len()
        );

        let context_messages: Vec<Message> = ranked.iter().map(|c| c.message.clone()).collect();
        let frame = self.synthesizer.synthesize(&context_messages, &query);

        Ok(AssembledContext {
            query,
            embedding,
            ranked,
            frame,
        })
    }

    /// Reuses a supplied id, otherwise creates the conversation record.
    async fn resolve_conversation(
        &self,
        user_id: &str,
        requested: Option<String>,
        message: &str,
    ) -> Result<String, PipelineError> {
        if let Some(id) = requested.filter(|id| !id.trim().is_empty()) {
            return Ok(id);
        }

        let id = new_conversation_id();
        let title = excerpt(message, self.config.title_max_chars);
        self.message_store
            .create_conversation(user_id, &id, title)
            .await
            .map_err(PipelineError::Conversation)?;

        info!("Conversation created: id={}, user={}", id, user_id);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::Role;
    use crate::services::context::testing::{InMemoryStore, RecordingLlm, StaticEmbedder};
    use crate::services::context::Intent;

    fn orchestrator(
        store: Arc<InMemoryStore>,
        llm: Arc<RecordingLlm>,
    ) -> ConversationOrchestrator {
        ConversationOrchestrator::new(
            Arc::new(StaticEmbedder::new(vec![1.0, 0.0, 0.0])),
            store,
            llm,
            PipelineConfig::default(),
            "system".to_string(),
        )
    }

    fn request(user_id: &str, message: &str, conversation_id: Option<&str>) -> QueryRequest {
        QueryRequest {
            user_id: user_id.to_string(),
            message: message.to_string(),
            conversation_id: conversation_id.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_first_message_without_candidates() {
        let store = Arc::new(InMemoryStore::default());
        let llm = Arc::new(RecordingLlm::new("answer"));
        let orch = orchestrator(store.clone(), llm.clone());

        let resp = orch
            .process(request(
                "u1",
                "How does the Axiom hive handle deterministic scheduling?",
                None,
            ))
            .await
            .unwrap();

        assert_eq!(resp.answer, "answer");
        assert_eq!(resp.context_summary, "Used 0 prior messages. Intent: axiom_hive.");
        assert!(resp.conversation_id.starts_with("conv_"));

        let conversations = store.conversations();
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0].title, "How does the Axiom hive handle deterministic sched");

        let messages = store.messages_of(&resp.conversation_id);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].embedding.as_deref(), Some(&[1.0, 0.0, 0.0][..]));
        assert_eq!(messages[1].role, Role::Assistant);
        assert!(messages[1].embedding.is_none());

        let call = llm.last_call();
        assert!(call.history.is_empty());
        assert_eq!(call.system_prompt, "system");
        assert!(call.context_frame.contains("Intent: axiom_hive"));
    }

    #[tokio::test]
    async fn test_threshold_keeps_only_relevant_candidates() {
        let store = Arc::new(InMemoryStore::default());
        store.seed_user_message("u1", "conv_old", "auditor hash spec", vec![1.0, 0.0, 0.0]);
        store.seed_user_message("u1", "conv_old", "what should I cook tonight", vec![0.9, 0.1, 0.0]);
        let llm = Arc::new(RecordingLlm::new("ok"));
        let orch = orchestrator(store.clone(), llm.clone());

        let resp = orch
            .process(request("u1", "Does the pocket auditor verify hashes?", None))
            .await
            .unwrap();

        assert_eq!(resp.context_summary, "Used 1 prior messages. Intent: pocket_auditor.");
        let frame = llm.last_call().context_frame;
        assert!(frame.contains("- auditor hash spec..."));
        assert!(!frame.contains("cook tonight"));
    }

    #[tokio::test]
    async fn test_candidates_of_other_users_are_not_retrieved() {
        let store = Arc::new(InMemoryStore::default());
        store.seed_user_message("u2", "conv_other", "axiom schema", vec![1.0, 0.0, 0.0]);
        let llm = Arc::new(RecordingLlm::new("ok"));
        let orch = orchestrator(store, llm);

        let resp = orch.process(request("u1", "axiom?", None)).await.unwrap();
        assert_eq!(resp.context_summary, "Used 0 prior messages. Intent: axiom_hive.");
    }

    #[tokio::test]
    async fn test_reused_conversation_id_is_never_recreated() {
        let store = Arc::new(InMemoryStore::default());
        let llm = Arc::new(RecordingLlm::new("ok"));
        let orch = orchestrator(store.clone(), llm.clone());

        let first = orch.process(request("u1", "first message", None)).await.unwrap();
        let second = orch
            .process(request("u1", "second message", Some(&first.conversation_id)))
            .await
            .unwrap();
        let third = orch
            .process(request("u1", "third message", Some(&first.conversation_id)))
            .await
            .unwrap();

        assert_eq!(second.conversation_id, first.conversation_id);
        assert_eq!(third.conversation_id, first.conversation_id);
        assert_eq!(store.conversations().len(), 1);
        assert_eq!(store.messages_of(&first.conversation_id).len(), 6);
    }

    #[tokio::test]
    async fn test_blank_conversation_id_counts_as_absent() {
        let store = Arc::new(InMemoryStore::default());
        let llm = Arc::new(RecordingLlm::new("ok"));
        let orch = orchestrator(store.clone(), llm);

        let resp = orch.process(request("u1", "hello", Some("  "))).await.unwrap();
        assert!(resp.conversation_id.starts_with("conv_"));
        assert_eq!(store.conversations().len(), 1);
    }

    #[tokio::test]
    async fn test_history_is_recent_and_chronological() {
        let store = Arc::new(InMemoryStore::default());
        let llm = Arc::new(RecordingLlm::new("reply"));
        let orch = orchestrator(store.clone(), llm.clone());

        let first = orch.process(request("u1", "m1", None)).await.unwrap();
        let conv = first.conversation_id;
        for text in ["m2", "m3", "m4"] {
            orch.process(request("u1", text, Some(&conv))).await.unwrap();
        }

        // Three finished turns = 6 messages; the model sees the latest 5.
        let call = llm.last_call();
        let contents: Vec<&str> = call.history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["reply", "m2", "reply", "m3", "reply"]);
        assert!(call
            .history
            .windows(2)
            .all(|w| w[0].created_at <= w[1].created_at));
        assert_eq!(call.new_message, "m4");
    }

    #[tokio::test]
    async fn test_embedding_failure_writes_nothing() {
        let store = Arc::new(InMemoryStore::default());
        let mut embedder = MockEmbeddingProvider::new();
        embedder
            .expect_embed()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("provider unavailable")));
        let mut llm = MockLlmProvider::new();
        llm.expect_invoke().never();

        let orch = ConversationOrchestrator::new(
            Arc::new(embedder),
            store.clone(),
            Arc::new(llm),
            PipelineConfig::default(),
            "system".into(),
        );

        let err = orch.process(request("u1", "hello", None)).await.unwrap_err();
        assert!(matches!(err, PipelineError::Embedding(_)));
        assert!(store.conversations().is_empty());
        assert_eq!(store.message_count(), 0);
    }

    #[tokio::test]
    async fn test_model_failure_keeps_earlier_writes() {
        let store = Arc::new(InMemoryStore::default());
        let mut llm = MockLlmProvider::new();
        llm.expect_invoke()
            .times(1)
            .returning(|_, _, _, _| Err(anyhow::anyhow!("quota exceeded")));

        let orch = ConversationOrchestrator::new(
            Arc::new(StaticEmbedder::new(vec![0.5, 0.5, 0.0])),
            store.clone(),
            Arc::new(llm),
            PipelineConfig::default(),
            "system".into(),
        );

        let err = orch.process(request("u1", "hello", None)).await.unwrap_err();
        assert!(matches!(err, PipelineError::Model(_)));
        assert_eq!(store.conversations().len(), 1);

        let messages = store.messages_of(&store.conversations()[0].id);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::User);
    }

    #[tokio::test]
    async fn test_retrieval_requests_configured_limit() {
        let mut store = MockMessageStore::new();
        store
            .expect_find_similar_messages()
            .withf(|user_id, embedding, limit| user_id == "u1" && embedding.len() == 3 && *limit == 20)
            .times(1)
            .returning(|_, _, _| Err(anyhow::anyhow!("connection refused")));
        store.expect_create_conversation().never();
        store.expect_insert_message().never();

        let orch = ConversationOrchestrator::new(
            Arc::new(StaticEmbedder::new(vec![0.0, 1.0, 0.0])),
            Arc::new(store),
            Arc::new(RecordingLlm::new("unused")),
            PipelineConfig::default(),
            "system".into(),
        );

        let err = orch.process(request("u1", "hello", None)).await.unwrap_err();
        assert!(matches!(err, PipelineError::Retrieval(_)));
    }

    #[test]
    fn test_rank_is_stable_filtered_and_capped() {
        let store = Arc::new(InMemoryStore::default());
        let orch = orchestrator(store, Arc::new(RecordingLlm::new("")));
        let query = IntentClassifier::classify("axiom question");

        let candidates: Vec<Message> = [
            "axiom a",          // 12
            "nothing",          // 0
            "axiom schema b",   // 17
            "axiom c",          // 12
            "axiom d",          // 12
            "axiom e",          // 12
            "axiom f",          // 12
            "schema only",      // 5, not above threshold
        ]
        .iter()
        .map(|c| Message::user("conv", c, vec![]))
        .collect();

        let ranked = orch.rank(candidates, &query);
        let contents: Vec<&str> = ranked.iter().map(|c| c.message.content.as_str()).collect();
        assert_eq!(contents, vec!["axiom schema b", "axiom a", "axiom c", "axiom d", "axiom e"]);
        assert!(ranked.iter().all(|c| c.score > 5));
    }

    #[tokio::test]
    async fn test_preview_has_no_side_effects() {
        let store = Arc::new(InMemoryStore::default());
        store.seed_user_message("u1", "conv_old", "The gemini prompt spec must be short", vec![1.0, 0.0, 0.0]);
        let mut llm = MockLlmProvider::new();
        llm.expect_invoke().never();

        let orch = ConversationOrchestrator::new(
            Arc::new(StaticEmbedder::new(vec![1.0, 0.0, 0.0])),
            store.clone(),
            Arc::new(llm),
            PipelineConfig::default(),
            "system".into(),
        );

        let preview = orch.preview("u1", "tune the gemini prompt").await.unwrap();
        assert_eq!(preview.intent, Intent::GeminiDesign);
        assert_eq!(preview.candidates.len(), 1);
        // gem 10 + gemini 2 + prompt 2 + spec 5
        assert_eq!(preview.candidates[0].score, 19);
        assert_eq!(preview.context_summary, "Used 1 prior messages. Intent: gemini_design.");
        assert!(preview.context_frame.contains("Recent Decisions/Constraints:\n- The gemini prompt spec must be short..."));
        // only the seeded conversation and message
        assert_eq!(store.conversations().len(), 1);
        assert_eq!(store.message_count(), 1);
    }
}
