//! Post Service
//!
//! Post CRUD, view counting, likes and bookmarks. Author-only rules for
//! update and delete are enforced here rather than in the repository.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::{Post, PostPage, PostRepository, PostSort, ToggleOutcome, UserRepository};
use crate::shared::snowflake::SnowflakeGenerator;

/// Post service errors
#[derive(Debug, thiserror::Error)]
pub enum PostError {
    #[error("Post not found")]
    PostNotFound,

    #[error("Not the author of this post")]
    NotAuthor,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// A post detail together with the requesting viewer's state.
#[derive(Debug, Clone)]
pub struct PostDetail {
    pub post: Post,
    pub nickname: String,
    pub liked: bool,
    pub bookmarked: bool,
}

/// Post service trait for dependency injection
#[async_trait]
pub trait PostService: Send + Sync {
    /// Create a post authored by `author_id`.
    async fn create_post(
        &self,
        author_id: i64,
        title: &str,
        content: &str,
        categories: Vec<String>,
        images: Vec<String>,
        thumbnail: Option<String>,
    ) -> Result<Post, PostError>;

    /// Fetch a post, bumping its view counter. `viewer` is None for
    /// anonymous requests.
    async fn get_post(&self, id: i64, viewer: Option<i64>) -> Result<PostDetail, PostError>;

    /// Update a post (author only). Images are replaced when provided.
    async fn update_post(
        &self,
        id: i64,
        author_id: i64,
        title: &str,
        content: &str,
        images: Option<Vec<String>>,
        thumbnail: Option<String>,
    ) -> Result<Post, PostError>;

    /// Delete a post (author only).
    async fn delete_post(&self, id: i64, author_id: i64) -> Result<(), PostError>;

    /// Paged listing.
    async fn list_posts(
        &self,
        page: u32,
        page_size: u32,
        sort: PostSort,
        viewer: Option<i64>,
    ) -> Result<PostPage, PostError>;

    /// Toggle a like.
    async fn toggle_like(&self, user_id: i64, post_id: i64) -> Result<ToggleOutcome, PostError>;

    /// Toggle a bookmark.
    async fn toggle_bookmark(
        &self,
        user_id: i64,
        post_id: i64,
    ) -> Result<ToggleOutcome, PostError>;
}

/// PostService implementation
pub struct PostServiceImpl<P, U>
where
    P: PostRepository,
    U: UserRepository,
{
    post_repo: Arc<P>,
    user_repo: Arc<U>,
    id_generator: Arc<SnowflakeGenerator>,
}

impl<P, U> PostServiceImpl<P, U>
where
    P: PostRepository,
    U: UserRepository,
{
    /// Create a new PostServiceImpl
    pub fn new(post_repo: Arc<P>, user_repo: Arc<U>, id_generator: Arc<SnowflakeGenerator>) -> Self {
        Self {
            post_repo,
            user_repo,
            id_generator,
        }
    }

    /// Load the post and check authorship.
    async fn load_owned(&self, id: i64, author_id: i64) -> Result<Post, PostError> {
        let post = self
            .post_repo
            .find_by_id(id)
            .await
            .map_err(|e| PostError::Internal(e.to_string()))?
            .ok_or(PostError::PostNotFound)?;

        if post.author_id != author_id {
            return Err(PostError::NotAuthor);
        }

        Ok(post)
    }
}

#[async_trait]
impl<P, U> PostService for PostServiceImpl<P, U>
where
    P: PostRepository + 'static,
    U: UserRepository + 'static,
{
    async fn create_post(
        &self,
        author_id: i64,
        title: &str,
        content: &str,
        categories: Vec<String>,
        images: Vec<String>,
        thumbnail: Option<String>,
    ) -> Result<Post, PostError> {
        let now = Utc::now();
        let post = Post {
            id: self.id_generator.generate(),
            author_id,
            title: title.to_string(),
            content: content.to_string(),
            thumbnail,
            view_count: 0,
            like_count: 0,
            categories,
            images,
            created_at: now,
            updated_at: now,
        };

        self.post_repo
            .create(&post)
            .await
            .map_err(|e| PostError::Internal(e.to_string()))
    }

    async fn get_post(&self, id: i64, viewer: Option<i64>) -> Result<PostDetail, PostError> {
        let mut post = self
            .post_repo
            .find_by_id(id)
            .await
            .map_err(|e| PostError::Internal(e.to_string()))?
            .ok_or(PostError::PostNotFound)?;

        post.view_count = self
            .post_repo
            .increment_views(id)
            .await
            .map_err(|e| PostError::Internal(e.to_string()))?;

        let nickname = self
            .user_repo
            .find_by_id(post.author_id)
            .await
            .map_err(|e| PostError::Internal(e.to_string()))?
            .map(|u| u.nickname)
            .unwrap_or_default();

        let (liked, bookmarked) = match viewer {
            Some(viewer) => {
                let liked = self
                    .post_repo
                    .is_liked(viewer, id)
                    .await
                    .map_err(|e| PostError::Internal(e.to_string()))?;
                let bookmarked = self
                    .post_repo
                    .is_bookmarked(viewer, id)
                    .await
                    .map_err(|e| PostError::Internal(e.to_string()))?;
                (liked, bookmarked)
            }
            None => (false, false),
        };

        Ok(PostDetail {
            post,
            nickname,
            liked,
            bookmarked,
        })
    }

    async fn update_post(
        &self,
        id: i64,
        author_id: i64,
        title: &str,
        content: &str,
        images: Option<Vec<String>>,
        thumbnail: Option<String>,
    ) -> Result<Post, PostError> {
        let mut post = self.load_owned(id, author_id).await?;
        post.title = title.to_string();
        post.content = content.to_string();
        post.thumbnail = thumbnail;

        let mut post = self
            .post_repo
            .update(&post)
            .await
            .map_err(|e| PostError::Internal(e.to_string()))?;

        if let Some(images) = images {
            self.post_repo
                .replace_images(id, &images)
                .await
                .map_err(|e| PostError::Internal(e.to_string()))?;
            post.images = images;
        }

        Ok(post)
    }

    async fn delete_post(&self, id: i64, author_id: i64) -> Result<(), PostError> {
        self.load_owned(id, author_id).await?;

        self.post_repo
            .delete(id)
            .await
            .map_err(|e| PostError::Internal(e.to_string()))
    }

    async fn list_posts(
        &self,
        page: u32,
        page_size: u32,
        sort: PostSort,
        viewer: Option<i64>,
    ) -> Result<PostPage, PostError> {
        self.post_repo
            .list_page(page.max(1), page_size, sort, viewer)
            .await
            .map_err(|e| PostError::Internal(e.to_string()))
    }

    async fn toggle_like(&self, user_id: i64, post_id: i64) -> Result<ToggleOutcome, PostError> {
        let exists = self
            .post_repo
            .find_by_id(post_id)
            .await
            .map_err(|e| PostError::Internal(e.to_string()))?;
        if exists.is_none() {
            return Err(PostError::PostNotFound);
        }

        self.post_repo
            .toggle_like(user_id, post_id)
            .await
            .map_err(|e| PostError::Internal(e.to_string()))
    }

    async fn toggle_bookmark(
        &self,
        user_id: i64,
        post_id: i64,
    ) -> Result<ToggleOutcome, PostError> {
        let exists = self
            .post_repo
            .find_by_id(post_id)
            .await
            .map_err(|e| PostError::Internal(e.to_string()))?;
        if exists.is_none() {
            return Err(PostError::PostNotFound);
        }

        self.post_repo
            .toggle_bookmark(user_id, post_id)
            .await
            .map_err(|e| PostError::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MockPostRepository, MockUserRepository, User};

    fn sample_post(id: i64, author_id: i64) -> Post {
        let now = Utc::now();
        Post {
            id,
            author_id,
            title: "title".into(),
            content: "content".into(),
            thumbnail: None,
            view_count: 0,
            like_count: 0,
            categories: vec![],
            images: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    fn service(
        post_repo: MockPostRepository,
    ) -> PostServiceImpl<MockPostRepository, MockUserRepository> {
        let mut user_repo = MockUserRepository::new();
        user_repo.expect_find_by_id().returning(|id| {
            Ok(Some(User {
                id,
                nickname: "author".into(),
                ..User::default()
            }))
        });

        PostServiceImpl::new(
            Arc::new(post_repo),
            Arc::new(user_repo),
            Arc::new(SnowflakeGenerator::new(1)),
        )
    }

    #[tokio::test]
    async fn test_update_rejects_non_author() {
        let mut repo = MockPostRepository::new();
        repo.expect_find_by_id()
            .returning(|id| Ok(Some(sample_post(id, 1))));

        let svc = service(repo);
        let result = svc.update_post(10, 2, "t", "c", None, None).await;

        assert!(matches!(result, Err(PostError::NotAuthor)));
    }

    #[tokio::test]
    async fn test_delete_missing_post_is_not_found() {
        let mut repo = MockPostRepository::new();
        repo.expect_find_by_id().returning(|_| Ok(None));

        let svc = service(repo);
        let result = svc.delete_post(10, 1).await;

        assert!(matches!(result, Err(PostError::PostNotFound)));
    }

    #[tokio::test]
    async fn test_get_post_reports_fresh_view_count() {
        let mut repo = MockPostRepository::new();
        repo.expect_find_by_id()
            .returning(|id| Ok(Some(sample_post(id, 1))));
        repo.expect_increment_views().returning(|_| Ok(7));

        let svc = service(repo);
        let detail = svc.get_post(10, None).await.unwrap();

        assert_eq!(detail.post.view_count, 7);
        assert_eq!(detail.nickname, "author");
        assert!(!detail.liked);
        assert!(!detail.bookmarked);
    }

    #[tokio::test]
    async fn test_toggle_like_on_missing_post() {
        let mut repo = MockPostRepository::new();
        repo.expect_find_by_id().returning(|_| Ok(None));

        let svc = service(repo);
        let result = svc.toggle_like(1, 10).await;

        assert!(matches!(result, Err(PostError::PostNotFound)));
    }
}
