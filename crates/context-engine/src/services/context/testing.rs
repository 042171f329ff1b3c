//! In-memory collaborators for pipeline tests.

use anyhow::Result;
use chrono::Utc;
use std::sync::Mutex;

use crate::database::models::ConversationSummary;
use crate::models::chat::{Conversation, Message};

use super::orchestrator::{EmbeddingProvider, LlmProvider, MessageStore};

/// Returns the same vector for every text.
pub struct StaticEmbedder {
    vector: Vec<f32>,
}

impl StaticEmbedder {
    pub fn new(vector: Vec<f32>) -> Self {
        Self { vector }
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for StaticEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(self.vector.clone())
    }
}

/// Append-only store; insertion order doubles as chronological order.
#[derive(Default)]
pub struct InMemoryStore {
    conversations: Mutex<Vec<Conversation>>,
    messages: Mutex<Vec<Message>>,
}

impl InMemoryStore {
    pub fn seed_user_message(&self, user_id: &str, conversation_id: &str, content: &str, embedding: Vec<f32>) {
        {
            let mut conversations = self.conversations.lock().unwrap();
            if !conversations.iter().any(|c| c.id == conversation_id) {
                conversations.push(Conversation {
                    id: conversation_id.to_string(),
                    user_id: user_id.to_string(),
                    title: content.to_string(),
                    created_at: Utc::now(),
                });
            }
        }
        self.messages
            .lock()
            .unwrap()
            .push(Message::user(conversation_id, content, embedding));
    }

    pub fn conversations(&self) -> Vec<Conversation> {
        self.conversations.lock().unwrap().clone()
    }

    pub fn messages_of(&self, conversation_id: &str) -> Vec<Message> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect()
    }

    pub fn message_count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }

    fn owner_of(&self, conversation_id: &str) -> Option<String> {
        self.conversations
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == conversation_id)
            .map(|c| c.user_id.clone())
    }
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

#[async_trait::async_trait]
impl MessageStore for InMemoryStore {
    async fn find_similar_messages(
        &self,
        user_id: &str,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<Message>> {
        let messages = self.messages.lock().unwrap().clone();
        let mut candidates: Vec<(f32, Message)> = messages
            .into_iter()
            .filter(|m| m.role == crate::models::chat::Role::User)
            .filter(|m| self.owner_of(&m.conversation_id).as_deref() == Some(user_id))
            .filter_map(|m| {
                let distance = cosine_distance(m.embedding.as_deref()?, embedding);
                Some((distance, m))
            })
            .collect();

        candidates.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(candidates.into_iter().take(limit).map(|(_, m)| m).collect())
    }

    async fn get_recent_messages(&self, conversation_id: &str, limit: usize) -> Result<Vec<Message>> {
        let all = self.messages_of(conversation_id);
        let skip = all.len().saturating_sub(limit);
        Ok(all.into_iter().skip(skip).collect())
    }

    async fn create_conversation(&self, user_id: &str, conversation_id: &str, title: &str) -> Result<()> {
        let mut conversations = self.conversations.lock().unwrap();
        if conversations.iter().any(|c| c.id == conversation_id) {
            anyhow::bail!("duplicate conversation id {}", conversation_id);
        }
        conversations.push(Conversation {
            id: conversation_id.to_string(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn insert_message(&self, message: &Message) -> Result<()> {
        self.messages.lock().unwrap().push(message.clone());
        Ok(())
    }

    async fn list_conversations(&self, user_id: &str, limit: usize) -> Result<Vec<ConversationSummary>> {
        Ok(self
            .conversations
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|c| c.user_id == user_id)
            .take(limit)
            .map(|c| ConversationSummary {
                id: c.id.clone(),
                title: c.title.clone(),
                created_at: c.created_at,
            })
            .collect())
    }
}

#[derive(Debug, Clone)]
pub struct LlmCall {
    pub system_prompt: String,
    pub history: Vec<Message>,
    pub context_frame: String,
    pub new_message: String,
}

/// Answers with a fixed string and records every invocation.
pub struct RecordingLlm {
    answer: String,
    calls: Mutex<Vec<LlmCall>>,
}

impl RecordingLlm {
    pub fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn last_call(&self) -> LlmCall {
        self.calls
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("model was never invoked")
    }
}

#[async_trait::async_trait]
impl LlmProvider for RecordingLlm {
    async fn invoke(
        &self,
        system_prompt: &str,
        history: &[Message],
        context_frame: &str,
        new_message: &str,
    ) -> Result<String> {
        self.calls.lock().unwrap().push(LlmCall {
            system_prompt: system_prompt.to_string(),
            history: history.to_vec(),
            context_frame: context_frame.to_string(),
            new_message: new_message.to_string(),
        });
        Ok(self.answer.clone())
    }
}
