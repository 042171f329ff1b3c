use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ===== DOMAIN MODELS =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            other => anyhow::bail!("Unknown message role: {}", other),
        }
    }
}

/// A single append-only entry of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Message {
    /// User turn, stamped now. Carries the embedding it was retrieved with.
    pub fn user(conversation_id: &str, content: &str, embedding: Vec<f32>) -> Self {
        Self {
            id: new_message_id(),
            conversation_id: conversation_id.to_string(),
            role: Role::User,
            content: content.to_string(),
            created_at: Utc::now(),
            embedding: Some(embedding),
        }
    }

    /// Assistant turn, stamped now. Never embedded.
    pub fn assistant(conversation_id: &str, content: &str) -> Self {
        Self {
            id: new_message_id(),
            conversation_id: conversation_id.to_string(),
            role: Role::Assistant,
            content: content.to_string(),
            created_at: Utc::now(),
            embedding: None,
        }
    }
}

/// A thread of messages owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

pub fn new_conversation_id() -> String {
    format!("conv_{}", uuid::Uuid::new_v4().simple())
}

pub fn new_message_id() -> String {
    format!("msg_{}", uuid::Uuid::new_v4().simple())
}

// ===== REQUEST MODELS =====

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub user_id: String,
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

// ===== RESPONSE MODELS =====

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub answer: String,
    pub conversation_id: String,
    pub context_summary: String,
}
