//! Discussion entity and repository trait.
//!
//! Maps to the `discussions` table plus the `discussion_members` and
//! `discussion_bans` side tables. The repository doubles as the registry
//! the room coordinator consults for existence, authorship, membership and
//! moderation state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// A participant identity as seen by the discussion room: the pair of
/// user ID and nickname resolved at connection time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: i64,
    pub nickname: String,
}

/// Represents a discussion thread.
///
/// Maps to the `discussions` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - author_id: BIGINT NOT NULL REFERENCES users(id)
/// - title: VARCHAR(255) NOT NULL
/// - progress: JSONB NOT NULL DEFAULT '{}' (free-form moderator state)
/// - created_at / updated_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discussion {
    /// Snowflake ID (primary key)
    pub id: i64,

    /// The identity that created the discussion; sole authority for
    /// progress updates and moderation
    pub author_id: i64,

    /// Discussion title
    pub title: String,

    /// Free-form progress blob, updated by the author from the room
    pub progress: serde_json::Value,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Discussion {
    /// Check whether the given user authored this discussion.
    pub fn is_author(&self, user_id: i64) -> bool {
        self.author_id == user_id
    }
}

/// Repository trait for Discussion data access operations.
///
/// The room coordinator consumes the narrow lookup/mutate subset
/// (exists/verify_author/ban/membership/progress); the HTTP surface uses
/// the CRUD subset.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DiscussionRepository: Send + Sync {
    /// Find a discussion by ID.
    async fn find_by_id(&self, id: i64) -> Result<Option<Discussion>, AppError>;

    /// Whether a discussion with this ID exists.
    async fn exists(&self, id: i64) -> Result<bool, AppError>;

    /// Create a new discussion.
    async fn create(&self, discussion: &Discussion) -> Result<Discussion, AppError>;

    /// Update the title (author-only, enforced by the caller).
    async fn update_title(&self, id: i64, title: &str) -> Result<Discussion, AppError>;

    /// Whether the given user authored the discussion.
    async fn verify_author(&self, id: i64, user_id: i64) -> Result<bool, AppError>;

    /// Persist a new progress blob. Last writer wins; no concurrency control.
    async fn set_progress(&self, id: i64, progress: &serde_json::Value) -> Result<(), AppError>;

    /// Record a user as a known member of the discussion. Idempotent.
    async fn add_member(&self, id: i64, user_id: i64) -> Result<(), AppError>;

    /// All identities ever recorded as members, for status snapshots.
    async fn list_known_members(&self, id: i64) -> Result<Vec<Participant>, AppError>;

    /// Whether the given user is on the discussion's ban list.
    async fn is_banned(&self, id: i64, user_id: i64) -> Result<bool, AppError>;

    /// Add the user with this nickname to the ban list.
    /// Fails with NotFound when no such user exists.
    async fn add_ban(&self, id: i64, nickname: &str) -> Result<(), AppError>;

    /// Remove the user with this nickname from the ban list.
    async fn remove_ban(&self, id: i64, nickname: &str) -> Result<(), AppError>;

    /// The identities currently banned from the discussion.
    async fn get_ban_list(&self, id: i64) -> Result<Vec<Participant>, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_author() {
        let discussion = Discussion {
            id: 1,
            author_id: 42,
            title: "rust vs go".into(),
            progress: serde_json::json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert!(discussion.is_author(42));
        assert!(!discussion.is_author(7));
    }

    #[test]
    fn test_participant_equality_covers_both_fields() {
        let a = Participant {
            user_id: 1,
            nickname: "alice".into(),
        };
        let b = Participant {
            user_id: 1,
            nickname: "alice".into(),
        };
        let c = Participant {
            user_id: 2,
            nickname: "alice".into(),
        };

        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
