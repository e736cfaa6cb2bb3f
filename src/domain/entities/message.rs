//! Chat message entity and repository trait.
//!
//! Maps to the `chat_messages` table. The room coordinator persists each
//! message through this trait before broadcasting, so the broadcast frame
//! carries a real message ID and timestamp. History retrieval is
//! deliberately absent from the trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

use super::discussion::Participant;

/// A persisted chat message.
///
/// Maps to the `chat_messages` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - discussion_id: BIGINT NOT NULL REFERENCES discussions(id)
/// - user_id: BIGINT NOT NULL REFERENCES users(id)
/// - nickname: VARCHAR(32) NOT NULL (denormalized sender nickname)
/// - content: TEXT NOT NULL
/// - created_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Snowflake ID (primary key)
    pub id: i64,

    /// Discussion this message belongs to
    pub discussion_id: i64,

    /// Sender user ID
    pub user_id: i64,

    /// Sender nickname at send time
    pub nickname: String,

    /// Message text
    pub content: String,

    /// Persistence timestamp
    pub created_at: DateTime<Utc>,
}

/// Repository trait for chat message persistence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Persist a message, supplying its ID and created_at.
    async fn persist(
        &self,
        discussion_id: i64,
        sender: &Participant,
        content: &str,
    ) -> Result<ChatMessage, AppError>;
}
