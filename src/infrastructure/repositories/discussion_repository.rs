//! Discussion Repository Implementation
//!
//! PostgreSQL implementation of the DiscussionRepository trait. Serves both
//! the HTTP CRUD surface and the room coordinator's registry lookups
//! (existence, authorship, membership, ban list, progress).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Discussion, DiscussionRepository, Participant};
use crate::shared::error::AppError;

/// Database row representation matching the discussions table schema.
#[derive(Debug, sqlx::FromRow)]
struct DiscussionRow {
    id: i64,
    author_id: i64,
    title: String,
    progress: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DiscussionRow {
    /// Convert database row to domain Discussion entity.
    fn into_discussion(self) -> Discussion {
        Discussion {
            id: self.id,
            author_id: self.author_id,
            title: self.title,
            progress: self.progress,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// PostgreSQL discussion repository implementation.
#[derive(Clone)]
pub struct PgDiscussionRepository {
    pool: PgPool,
}

impl PgDiscussionRepository {
    /// Create a new PgDiscussionRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Resolve a user ID from a nickname, for ban list mutations.
    async fn resolve_user_id(&self, nickname: &str) -> Result<i64, AppError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE nickname = $1")
            .bind(nickname)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.0)
            .ok_or_else(|| AppError::NotFound(format!("User '{}' not found", nickname)))
    }
}

#[async_trait]
impl DiscussionRepository for PgDiscussionRepository {
    /// Find a discussion by ID.
    async fn find_by_id(&self, id: i64) -> Result<Option<Discussion>, AppError> {
        let row = sqlx::query_as::<_, DiscussionRow>(
            r#"
            SELECT id, author_id, title, progress, created_at, updated_at
            FROM discussions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_discussion()))
    }

    /// Whether a discussion with this ID exists.
    async fn exists(&self, id: i64) -> Result<bool, AppError> {
        let exists: (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM discussions WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists.0)
    }

    /// Create a new discussion.
    async fn create(&self, discussion: &Discussion) -> Result<Discussion, AppError> {
        let row = sqlx::query_as::<_, DiscussionRow>(
            r#"
            INSERT INTO discussions (id, author_id, title, progress)
            VALUES ($1, $2, $3, $4)
            RETURNING id, author_id, title, progress, created_at, updated_at
            "#,
        )
        .bind(discussion.id)
        .bind(discussion.author_id)
        .bind(&discussion.title)
        .bind(&discussion.progress)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_discussion())
    }

    /// Update the title.
    async fn update_title(&self, id: i64, title: &str) -> Result<Discussion, AppError> {
        let row = sqlx::query_as::<_, DiscussionRow>(
            r#"
            UPDATE discussions
            SET title = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, author_id, title, progress, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(title)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_discussion())
            .ok_or_else(|| AppError::NotFound(format!("Discussion {} not found", id)))
    }

    /// Whether the given user authored the discussion.
    async fn verify_author(&self, id: i64, user_id: i64) -> Result<bool, AppError> {
        let exists: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM discussions WHERE id = $1 AND author_id = $2)",
        )
        .bind(id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists.0)
    }

    /// Persist a new progress blob. Last writer wins.
    async fn set_progress(&self, id: i64, progress: &serde_json::Value) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE discussions SET progress = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(progress)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Discussion {} not found", id)));
        }

        Ok(())
    }

    /// Record a user as a known member of the discussion. Idempotent.
    async fn add_member(&self, id: i64, user_id: i64) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO discussion_members (discussion_id, user_id) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// All identities ever recorded as members, for status snapshots.
    async fn list_known_members(&self, id: i64) -> Result<Vec<Participant>, AppError> {
        let rows: Vec<(i64, String)> = sqlx::query_as(
            r#"
            SELECT u.id, u.nickname
            FROM discussion_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.discussion_id = $1
            ORDER BY m.joined_at
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(user_id, nickname)| Participant { user_id, nickname })
            .collect())
    }

    /// Whether the given user is on the discussion's ban list.
    async fn is_banned(&self, id: i64, user_id: i64) -> Result<bool, AppError> {
        let exists: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM discussion_bans WHERE discussion_id = $1 AND user_id = $2)",
        )
        .bind(id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists.0)
    }

    /// Add the user with this nickname to the ban list.
    async fn add_ban(&self, id: i64, nickname: &str) -> Result<(), AppError> {
        let user_id = self.resolve_user_id(nickname).await?;

        sqlx::query(
            "INSERT INTO discussion_bans (discussion_id, user_id) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Remove the user with this nickname from the ban list.
    async fn remove_ban(&self, id: i64, nickname: &str) -> Result<(), AppError> {
        let user_id = self.resolve_user_id(nickname).await?;

        sqlx::query("DELETE FROM discussion_bans WHERE discussion_id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// The identities currently banned from the discussion.
    async fn get_ban_list(&self, id: i64) -> Result<Vec<Participant>, AppError> {
        let rows: Vec<(i64, String)> = sqlx::query_as(
            r#"
            SELECT u.id, u.nickname
            FROM discussion_bans b
            JOIN users u ON u.id = b.user_id
            WHERE b.discussion_id = $1
            ORDER BY b.banned_at
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(user_id, nickname)| Participant { user_id, nickname })
            .collect())
    }
}
