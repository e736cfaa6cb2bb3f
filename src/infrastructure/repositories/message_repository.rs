//! Message Repository Implementation
//!
//! PostgreSQL implementation of the MessageRepository trait. Mints the
//! message ID from the snowflake generator; created_at comes from the
//! database so broadcast frames carry the authoritative timestamp.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{ChatMessage, MessageRepository, Participant};
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;

/// PostgreSQL chat message repository implementation.
#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
    snowflake: Arc<SnowflakeGenerator>,
}

impl PgMessageRepository {
    /// Create a new PgMessageRepository.
    pub fn new(pool: PgPool, snowflake: Arc<SnowflakeGenerator>) -> Self {
        Self { pool, snowflake }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    /// Persist a message, supplying its ID and created_at.
    async fn persist(
        &self,
        discussion_id: i64,
        sender: &Participant,
        content: &str,
    ) -> Result<ChatMessage, AppError> {
        let id = self.snowflake.generate();

        let row: (DateTime<Utc>,) = sqlx::query_as(
            r#"
            INSERT INTO chat_messages (id, discussion_id, user_id, nickname, content)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING created_at
            "#,
        )
        .bind(id)
        .bind(discussion_id)
        .bind(sender.user_id)
        .bind(&sender.nickname)
        .bind(content)
        .fetch_one(&self.pool)
        .await?;

        Ok(ChatMessage {
            id,
            discussion_id,
            user_id: sender.user_id,
            nickname: sender.nickname.clone(),
            content: content.to_string(),
            created_at: row.0,
        })
    }
}
