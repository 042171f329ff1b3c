use crate::config::ScoringConfig;
use crate::models::chat::Message;

use super::types::{Intent, NormalizedQuery};

const SPEC_MARKERS: &[&str] = &["spec", "schema", "contract"];

/// Additive keyword scorer for retrieved candidates.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelevanceScorer {
    weights: ScoringConfig,
}

impl RelevanceScorer {
    pub fn new(weights: ScoringConfig) -> Self {
        Self { weights }
    }

    pub fn score(&self, candidate: &Message, query: &NormalizedQuery) -> u32 {
        let content = candidate.content.to_lowercase();
        let mut score = 0;

        let intent_marker = match query.intent {
            Intent::AxiomHive => Some("axiom"),
            Intent::PocketAuditor => Some("auditor"),
            Intent::GeminiDesign => Some("gem"),
            Intent::Coding | Intent::General => None,
        };
        if intent_marker.is_some_and(|marker| content.contains(marker)) {
            score += self.weights.intent_bonus;
        }

        let matched_tags = query
            .tags
            .iter()
            .filter(|tag| content.contains(**tag))
            .count() as u32;
        score += matched_tags * self.weights.tag_bonus;

        if SPEC_MARKERS.iter().any(|m| content.contains(m)) {
            score += self.weights.spec_bonus;
        }

        score
    }
}
