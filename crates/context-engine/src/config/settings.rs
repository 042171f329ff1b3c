use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub gemini: GeminiConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub prompts: PromptsConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_max_size: u32,
    pub pool_timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,
    pub dimension: usize,
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_seconds: u64,
    pub temperature: f32,
}

/// Tunables of the context assembly pipeline.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Max candidates requested from similarity search
    pub retrieval_limit: usize,
    /// Number of recent conversation messages sent as dialogue history
    pub history_limit: usize,
    /// Candidates must score strictly above this to enter the frame
    pub relevance_threshold: u32,
    /// Cap on candidates kept after ranking
    pub max_context_messages: usize,
    /// Title length (chars) of a freshly created conversation
    pub title_max_chars: usize,
    pub scoring: ScoringConfig,
    pub frame: FrameConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retrieval_limit: 20,
            history_limit: 5,
            relevance_threshold: 5,
            max_context_messages: 5,
            title_max_chars: 50,
            scoring: ScoringConfig::default(),
            frame: FrameConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct ScoringConfig {
    pub intent_bonus: u32,
    pub tag_bonus: u32,
    pub spec_bonus: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            intent_bonus: 10,
            tag_bonus: 2,
            spec_bonus: 5,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct FrameConfig {
    pub max_items_per_section: usize,
    pub excerpt_chars: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_items_per_section: 3,
            excerpt_chars: 100,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct PromptsConfig {
    pub system_prompt: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            system_prompt: "You are a deterministic engine. Always respect the provided context frame and never contradict prior constraints.".to_string(),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .add_source(File::with_name("config/settings").required(true))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        Ok(settings)
    }
}
