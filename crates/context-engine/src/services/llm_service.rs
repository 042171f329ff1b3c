use crate::config::LlmConfig;
use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::models::chat::{Message, Role};
// Import trait from the context pipeline
use crate::services::context::LlmProvider;

pub const CONTEXT_ACKNOWLEDGEMENT: &str =
    "Context acknowledged. Ready to process user queries under constraints.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatTurn>,
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Gemini chat client over the OpenAI-compatible completions endpoint
#[derive(Clone)]
pub struct LlmService {
    client: Client,
    config: LlmConfig,
    api_key: String,
}

impl LlmService {
    pub fn new(config: LlmConfig, api_key: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_seconds))
                .build()
                .unwrap_or_else(|_| Client::new()),
            config,
            api_key,
        }
    }

    /// Turn order: system instruction, context frame, acknowledgement,
    /// dialogue history, then the new message.
    pub fn build_turns(
        system_prompt: &str,
        history: &[Message],
        context_frame: &str,
        new_message: &str,
    ) -> Vec<ChatTurn> {
        let mut turns = Vec::with_capacity(history.len() + 4);
        turns.push(ChatTurn::new("system", system_prompt));
        turns.push(ChatTurn::new("user", format!("SYSTEM CONTEXT:\n{}", context_frame)));
        turns.push(ChatTurn::new("assistant", CONTEXT_ACKNOWLEDGEMENT));

        turns.extend(history.iter().map(|msg| {
            let role = match msg.role {
                Role::Assistant => "assistant",
                Role::User | Role::System => "user",
            };
            ChatTurn::new(role, msg.content.clone())
        }));

        turns.push(ChatTurn::new("user", new_message));
        turns
    }

    pub async fn generate_chat(&self, messages: Vec<ChatTurn>) -> Result<String> {
        debug!("Starting chat generation with {} messages", messages.len());

        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            stream: false,
        };

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to call LLM API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("LLM API error: {} - {}", status, body);
        }

        let chat_response: ChatCompletionResponse = response
            .json()
            .await
            .context("Failed to parse LLM response")?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .context("No choices returned from LLM")
    }
}

#[async_trait::async_trait]
impl LlmProvider for LlmService {
    async fn invoke(
        &self,
        system_prompt: &str,
        history: &[Message],
        context_frame: &str,
        new_message: &str,
    ) -> Result<String> {
        let turns = Self::build_turns(system_prompt, history, context_frame, new_message);
        self.generate_chat(turns).await
    }
}
