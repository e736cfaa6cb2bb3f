//! Discussion Service
//!
//! Discussion CRUD for the HTTP surface. The real-time room semantics
//! (join/ban/progress broadcast) live in the websocket coordinator; this
//! service only covers creation and metadata updates.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::{Discussion, DiscussionRepository};
use crate::shared::snowflake::SnowflakeGenerator;

/// Discussion service errors
#[derive(Debug, thiserror::Error)]
pub enum DiscussionError {
    #[error("Discussion not found")]
    DiscussionNotFound,

    #[error("Not the author of this discussion")]
    NotAuthor,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Discussion service trait for dependency injection
#[async_trait]
pub trait DiscussionService: Send + Sync {
    /// Create a discussion authored by `author_id`.
    async fn create_discussion(
        &self,
        author_id: i64,
        title: &str,
    ) -> Result<Discussion, DiscussionError>;

    /// Update the title (author only).
    async fn update_discussion(
        &self,
        id: i64,
        author_id: i64,
        title: &str,
    ) -> Result<Discussion, DiscussionError>;

    /// Fetch a discussion.
    async fn get_discussion(&self, id: i64) -> Result<Discussion, DiscussionError>;
}

/// DiscussionService implementation
pub struct DiscussionServiceImpl<D>
where
    D: DiscussionRepository,
{
    discussion_repo: Arc<D>,
    id_generator: Arc<SnowflakeGenerator>,
}

impl<D> DiscussionServiceImpl<D>
where
    D: DiscussionRepository,
{
    /// Create a new DiscussionServiceImpl
    pub fn new(discussion_repo: Arc<D>, id_generator: Arc<SnowflakeGenerator>) -> Self {
        Self {
            discussion_repo,
            id_generator,
        }
    }
}

#[async_trait]
impl<D> DiscussionService for DiscussionServiceImpl<D>
where
    D: DiscussionRepository + 'static,
{
    async fn create_discussion(
        &self,
        author_id: i64,
        title: &str,
    ) -> Result<Discussion, DiscussionError> {
        let now = Utc::now();
        let discussion = Discussion {
            id: self.id_generator.generate(),
            author_id,
            title: title.to_string(),
            progress: serde_json::json!({}),
            created_at: now,
            updated_at: now,
        };

        let created = self
            .discussion_repo
            .create(&discussion)
            .await
            .map_err(|e| DiscussionError::Internal(e.to_string()))?;

        // The author is a known member of their own room from the start
        self.discussion_repo
            .add_member(created.id, author_id)
            .await
            .map_err(|e| DiscussionError::Internal(e.to_string()))?;

        Ok(created)
    }

    async fn update_discussion(
        &self,
        id: i64,
        author_id: i64,
        title: &str,
    ) -> Result<Discussion, DiscussionError> {
        let is_author = self
            .discussion_repo
            .verify_author(id, author_id)
            .await
            .map_err(|e| DiscussionError::Internal(e.to_string()))?;

        if !is_author {
            // Distinguish missing from forbidden for the HTTP response
            let exists = self
                .discussion_repo
                .exists(id)
                .await
                .map_err(|e| DiscussionError::Internal(e.to_string()))?;
            return Err(if exists {
                DiscussionError::NotAuthor
            } else {
                DiscussionError::DiscussionNotFound
            });
        }

        self.discussion_repo
            .update_title(id, title)
            .await
            .map_err(|e| DiscussionError::Internal(e.to_string()))
    }

    async fn get_discussion(&self, id: i64) -> Result<Discussion, DiscussionError> {
        self.discussion_repo
            .find_by_id(id)
            .await
            .map_err(|e| DiscussionError::Internal(e.to_string()))?
            .ok_or(DiscussionError::DiscussionNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MockDiscussionRepository;

    #[tokio::test]
    async fn test_update_by_non_author_is_rejected() {
        let mut repo = MockDiscussionRepository::new();
        repo.expect_verify_author().returning(|_, _| Ok(false));
        repo.expect_exists().returning(|_| Ok(true));

        let svc = DiscussionServiceImpl::new(
            Arc::new(repo),
            Arc::new(SnowflakeGenerator::new(1)),
        );
        let result = svc.update_discussion(1, 99, "new title").await;

        assert!(matches!(result, Err(DiscussionError::NotAuthor)));
    }

    #[tokio::test]
    async fn test_update_missing_discussion_is_not_found() {
        let mut repo = MockDiscussionRepository::new();
        repo.expect_verify_author().returning(|_, _| Ok(false));
        repo.expect_exists().returning(|_| Ok(false));

        let svc = DiscussionServiceImpl::new(
            Arc::new(repo),
            Arc::new(SnowflakeGenerator::new(1)),
        );
        let result = svc.update_discussion(1, 99, "new title").await;

        assert!(matches!(result, Err(DiscussionError::DiscussionNotFound)));
    }

    #[tokio::test]
    async fn test_create_records_author_as_member() {
        let mut repo = MockDiscussionRepository::new();
        repo.expect_create()
            .returning(|d| Ok(d.clone()));
        repo.expect_add_member()
            .withf(|_, user_id| *user_id == 7)
            .times(1)
            .returning(|_, _| Ok(()));

        let svc = DiscussionServiceImpl::new(
            Arc::new(repo),
            Arc::new(SnowflakeGenerator::new(1)),
        );
        let discussion = svc.create_discussion(7, "rust vs go").await.unwrap();

        assert_eq!(discussion.author_id, 7);
        assert_eq!(discussion.title, "rust vs go");
    }
}
