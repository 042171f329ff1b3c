use crate::config::FrameConfig;
use crate::models::chat::Message;

use super::types::NormalizedQuery;

// Matched case-sensitively, unlike the scorer.
const SPEC_MARKERS: &[&str] = &["spec", "schema", "contract"];
const DECISION_MARKERS: &[&str] = &["must", "never", "always"];

const NONE_FOUND: &str = "None found";

const GROUNDING_INSTRUCTIONS: &str = "INSTRUCTIONS:
- Answer strictly based on the above context and specifications.
- If context is insufficient, ask clarifying questions.
- Never contradict recorded decisions or specifications.
- Explicitly state when using prior context.";

/// Builds the fixed-template context frame from already ranked candidates.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextFrameSynthesizer {
    config: FrameConfig,
}

impl ContextFrameSynthesizer {
    pub fn new(config: FrameConfig) -> Self {
        Self { config }
    }

    pub fn synthesize(&self, candidates: &[Message], query: &NormalizedQuery) -> String {
        let specs = self.section(candidates, SPEC_MARKERS);
        let decisions = self.section(candidates, DECISION_MARKERS);

        format!(
            "USER CONTEXT:
Intent: {intent}
Relevant Specifications:
{specs}

Recent Decisions/Constraints:
{decisions}

Current Query: {text}

{instructions}",
            intent = query.intent,
            specs = specs,
            decisions = decisions,
            text = query.text,
            instructions = GROUNDING_INSTRUCTIONS,
        )
    }

    /// First matching candidates, in input order, one line each.
    fn section(&self, candidates: &[Message], markers: &[&str]) -> String {
        let lines: Vec<String> = candidates
            .iter()
            .filter(|m| markers.iter().any(|marker| m.content.contains(marker)))
            .take(self.config.max_items_per_section)
            .map(|m| self.render_line(&m.content))
            .collect();

        if lines.is_empty() {
            NONE_FOUND.to_string()
        } else {
            lines.join("\n")
        }
    }

    /// `- <first N chars>...`; the ellipsis is appended even for short content.
    pub fn render_line(&self, content: &str) -> String {
        format!("- {}...", excerpt(content, self.config.excerpt_chars))
    }
}

/// First `max_chars` characters, cut without regard to word boundaries.
pub fn excerpt(content: &str, max_chars: usize) -> &str {
    match content.char_indices().nth(max_chars) {
        Some((idx, _)) => &content[..idx],
        None => content,
    }
}
