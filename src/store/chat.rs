use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::chat::{ChatMessage, ChatSession, Sender, SessionSummary};

/// Per-user chat history. Every accessor is scoped by `(chat_id, username)`;
/// a session belonging to someone else looks exactly like a missing one.
#[derive(Clone)]
pub struct ChatStore {
    pool: PgPool,
}

impl ChatStore {
    pub fn new(pool: PgPool) -> Self {
        ChatStore { pool }
    }

    /// Create an empty session. The name defaults to a timestamped label
    /// when the caller omits one.
    pub async fn create_session(
        &self,
        username: &str,
        session_name: Option<String>,
    ) -> Result<ChatSession, ApiError> {
        let chat_id = Uuid::new_v4().to_string();
        let session_name = session_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("Chat {}", Utc::now().format("%Y-%m-%d %H:%M")));

        let session = sqlx::query_as::<_, ChatSession>(
            "INSERT INTO chat_sessions (chat_id, username, session_name)
             VALUES ($1, $2, $3)
             RETURNING chat_id, username, session_name, created_at, updated_at",
        )
        .bind(&chat_id)
        .bind(username)
        .bind(&session_name)
        .fetch_one(&self.pool)
        .await?;

        Ok(session)
    }

    /// Append one message and advance the session's `updated_at` in a single
    /// statement, so concurrent appends to the same chat cannot lose an
    /// update and a vanished session shows up as zero rows.
    pub async fn append_message(
        &self,
        chat_id: &str,
        username: &str,
        sender: Sender,
        body: &str,
    ) -> Result<String, ApiError> {
        let message_id = Uuid::new_v4().to_string();

        let result = sqlx::query(
            "WITH bumped AS (
                 UPDATE chat_sessions SET updated_at = NOW()
                 WHERE chat_id = $1 AND username = $2
                 RETURNING chat_id
             )
             INSERT INTO chat_messages (message_id, chat_id, sender, body)
             SELECT $3, chat_id, $4, $5 FROM bumped",
        )
        .bind(chat_id)
        .bind(username)
        .bind(&message_id)
        .bind(sender.as_str())
        .bind(body)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("Chat session not found"));
        }
        Ok(message_id)
    }

    /// Session summaries for one user, most recently touched first.
    pub async fn list_sessions(&self, username: &str) -> Result<Vec<SessionSummary>, ApiError> {
        let sessions = sqlx::query_as::<_, SessionSummary>(
            "SELECT s.chat_id, s.session_name, s.created_at, s.updated_at,
                    COUNT(m.id) AS message_count
             FROM chat_sessions s
             LEFT JOIN chat_messages m ON m.chat_id = s.chat_id
             WHERE s.username = $1
             GROUP BY s.chat_id, s.session_name, s.created_at, s.updated_at
             ORDER BY s.updated_at DESC",
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await?;

        Ok(sessions)
    }

    /// Owner-scoped lookup used before anything touches a session's
    /// messages.
    pub async fn find_session(
        &self,
        chat_id: &str,
        username: &str,
    ) -> Result<Option<ChatSession>, ApiError> {
        let session = sqlx::query_as::<_, ChatSession>(
            "SELECT chat_id, username, session_name, created_at, updated_at
             FROM chat_sessions WHERE chat_id = $1 AND username = $2",
        )
        .bind(chat_id)
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    /// All messages for an owned session in append order. Not-found covers
    /// both an unknown chat_id and someone else's.
    pub async fn get_messages(
        &self,
        chat_id: &str,
        username: &str,
    ) -> Result<Vec<ChatMessage>, ApiError> {
        if self.find_session(chat_id, username).await?.is_none() {
            return Err(ApiError::NotFound("Chat session not found"));
        }

        let messages = sqlx::query_as::<_, ChatMessage>(
            "SELECT message_id, sender, body, created_at
             FROM chat_messages WHERE chat_id = $1
             ORDER BY id",
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    /// Delete an owned session; messages go with it via the cascade.
    pub async fn delete_session(&self, chat_id: &str, username: &str) -> Result<(), ApiError> {
        let result = sqlx::query("DELETE FROM chat_sessions WHERE chat_id = $1 AND username = $2")
            .bind(chat_id)
            .bind(username)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("Chat session not found"));
        }
        Ok(())
    }
}
