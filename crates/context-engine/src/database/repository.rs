use super::{ConversationSummary, DbPool, MessageRow};
use anyhow::{Context, Result};
use pgvector::Vector;
use tracing::{debug, info};

use crate::models::chat::Message;
use crate::services::context::MessageStore;

const DEFAULT_TITLE: &str = "New Chat";

pub struct Repository {
    pub pool: DbPool,
}

impl Repository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Idempotent schema bootstrap. `dimension` sizes the embedding column.
    pub async fn init_schema(&self, dimension: usize) -> Result<()> {
        let pool = self.pool.get_pool();

        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(pool)
            .await
            .context("Failed to enable pgvector extension")?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"#,
        )
        .execute(pool)
        .await
        .context("Failed to create conversations table")?;

        let messages_ddl = format!(
            r#"CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                seq BIGSERIAL,
                conversation_id TEXT NOT NULL REFERENCES conversations(id),
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                embedding vector({})
            )"#,
            dimension
        );
        sqlx::query(&messages_ddl)
            .execute(pool)
            .await
            .context("Failed to create messages table")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_conversation_role ON messages(conversation_id, role)",
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_conversations_user ON conversations(user_id)")
            .execute(pool)
            .await?;

        info!("Database schema ready (embedding dimension {})", dimension);
        Ok(())
    }
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// Turns rows fetched newest-first (`created_at DESC, seq DESC`) into
/// oldest-first messages. Equal timestamps keep insertion order.
fn chronological(rows: Vec<MessageRow>) -> Result<Vec<Message>> {
    rows.into_iter().rev().map(Message::try_from).collect()
}

#[async_trait::async_trait]
impl MessageStore for Repository {
    async fn find_similar_messages(
        &self,
        user_id: &str,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<Message>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"SELECT
                m.id,
                m.conversation_id,
                m.role,
                m.content,
                m.created_at
               FROM messages m
               JOIN conversations c ON m.conversation_id = c.id
               WHERE c.user_id = $1
                 AND m.role = 'user'
                 AND m.embedding IS NOT NULL
               ORDER BY m.embedding <=> $2
               LIMIT $3"#,
        )
        .bind(user_id)
        .bind(Vector::from(embedding.to_vec()))
        .bind(sql_limit(limit))
        .fetch_all(self.pool.get_pool())
        .await
        .context("Similarity search failed")?;

        debug!("Found {} similar messages for user {}", rows.len(), user_id);

        rows.into_iter().map(Message::try_from).collect()
    }

    async fn get_recent_messages(&self, conversation_id: &str, limit: usize) -> Result<Vec<Message>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"SELECT id, conversation_id, role, content, created_at
               FROM messages
               WHERE conversation_id = $1
               ORDER BY created_at DESC, seq DESC
               LIMIT $2"#,
        )
        .bind(conversation_id)
        .bind(sql_limit(limit))
        .fetch_all(self.pool.get_pool())
        .await
        .context("Failed to load recent messages")?;

        chronological(rows)
    }

    async fn create_conversation(&self, user_id: &str, conversation_id: &str, title: &str) -> Result<()> {
        let title = if title.trim().is_empty() { DEFAULT_TITLE } else { title };

        sqlx::query("INSERT INTO conversations (id, user_id, title) VALUES ($1, $2, $3)")
            .bind(conversation_id)
            .bind(user_id)
            .bind(title)
            .execute(self.pool.get_pool())
            .await
            .context("Failed to insert conversation")?;

        Ok(())
    }

    async fn insert_message(&self, message: &Message) -> Result<()> {
        let embedding = message.embedding.clone().map(Vector::from);

        sqlx::query(
            r#"INSERT INTO messages (id, conversation_id, role, content, created_at, embedding)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(&message.id)
        .bind(&message.conversation_id)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(message.created_at)
        .bind(embedding)
        .execute(self.pool.get_pool())
        .await
        .context("Failed to insert message")?;

        debug!("Inserted {} message {}", message.role, message.id);
        Ok(())
    }

    async fn list_conversations(&self, user_id: &str, limit: usize) -> Result<Vec<ConversationSummary>> {
        let conversations = sqlx::query_as::<_, ConversationSummary>(
            r#"SELECT id, COALESCE(title, 'New Chat') AS title, created_at
               FROM conversations
               WHERE user_id = $1
               ORDER BY created_at DESC
               LIMIT $2"#,
        )
        .bind(user_id)
        .bind(sql_limit(limit))
        .fetch_all(self.pool.get_pool())
        .await
        .context("Failed to list conversations")?;

        Ok(conversations)
    }
}
