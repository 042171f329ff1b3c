use serde::Serialize;
use std::fmt;

use crate::models::chat::Message;

/// Coarse topic label assigned to a user message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    AxiomHive,
    PocketAuditor,
    GeminiDesign,
    Coding,
    General,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AxiomHive => "axiom_hive",
            Self::PocketAuditor => "pocket_auditor",
            Self::GeminiDesign => "gemini_design",
            Self::Coding => "coding",
            Self::General => "general",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified form of the incoming message. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedQuery {
    /// Original message without surrounding whitespace, case preserved
    pub text: String,
    pub intent: Intent,
    pub tags: Vec<&'static str>,
}

/// Candidate prior message with its relevance score for one request
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub message: Message,
    pub score: u32,
}

/// What the pipeline would inject for a message, without side effects
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextPreview {
    pub intent: Intent,
    pub tags: Vec<&'static str>,
    pub candidates: Vec<CandidatePreview>,
    pub context_frame: String,
    pub context_summary: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidatePreview {
    pub message_id: String,
    pub conversation_id: String,
    pub score: u32,
    pub excerpt: String,
}

/// One-line report of what context went into an answer
pub fn context_summary(used: usize, intent: Intent) -> String {
    format!("Used {} prior messages. Intent: {}.", used, intent)
}
