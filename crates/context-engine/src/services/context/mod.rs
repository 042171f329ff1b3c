//! Context assembly pipeline
//!
//! Turns a user message into a grounded model call:
//! - Keyword intent classification
//! - Relevance scoring of similar prior messages
//! - Fixed-template context frame synthesis
//! - Request orchestration over injected collaborators

mod frame;
mod intent;
pub mod orchestrator;
mod scorer;
#[cfg(test)]
pub(crate) mod testing;
pub mod types;

pub use frame::{excerpt, ContextFrameSynthesizer};
pub use intent::IntentClassifier;
pub use orchestrator::{
    ConversationOrchestrator, EmbeddingProvider, LlmProvider, MessageStore, PipelineError,
};
pub use scorer::RelevanceScorer;
pub use types::{CandidatePreview, ContextPreview, Intent, NormalizedQuery, ScoredCandidate};
