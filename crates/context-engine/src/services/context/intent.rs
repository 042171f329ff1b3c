//! Intent Classifier
//! Maps a raw message to an intent label and topic tags by keyword matching.
//! Rules are checked in priority order and the first match wins.

use tracing::debug;

use super::types::{Intent, NormalizedQuery};

struct IntentRule {
    keywords: &'static [&'static str],
    intent: Intent,
    tags: &'static [&'static str],
}

const RULES: &[IntentRule] = &[
    IntentRule {
        keywords: &["axiom", "hive", "deterministic"],
        intent: Intent::AxiomHive,
        tags: &["axiom", "deterministic", "architecture"],
    },
    IntentRule {
        keywords: &["pocket", "auditor", "hash"],
        intent: Intent::PocketAuditor,
        tags: &["auditor", "verification", "crypto"],
    },
    IntentRule {
        keywords: &["gem", "gemini", "prompt"],
        intent: Intent::GeminiDesign,
        tags: &["gemini", "prompt", "agent"],
    },
    IntentRule {
        keywords: &["code", "implement", "build"],
        intent: Intent::Coding,
        tags: &["code", "implementation"],
    },
];

pub struct IntentClassifier;

impl IntentClassifier {
    pub fn classify(message: &str) -> NormalizedQuery {
        let lower = message.to_lowercase();

        let (intent, tags) = RULES
            .iter()
            .find_map(|rule| {
                rule.keywords
                    .iter()
                    .find(|kw| lower.contains(*kw))
                    .map(|kw| {
                        debug!("Detected {} intent: matched '{}'", rule.intent, kw);
                        (rule.intent, rule.tags.to_vec())
                    })
            })
            .unwrap_or_else(|| {
                debug!("Defaulting to general intent");
                (Intent::General, Vec::new())
            });

        NormalizedQuery {
            text: message.trim().to_string(),
            intent,
            tags,
        }
    }
}
