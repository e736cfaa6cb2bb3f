//! Post entity and repository trait.
//!
//! Maps to the `posts` table plus its `post_categories`, `post_images`,
//! `post_likes` and `post_bookmarks` side tables.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Represents a blog post.
///
/// Maps to the `posts` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - author_id: BIGINT NOT NULL REFERENCES users(id)
/// - title: VARCHAR(255) NOT NULL
/// - content: TEXT NOT NULL
/// - thumbnail: TEXT NULL
/// - view_count: INTEGER NOT NULL DEFAULT 0
/// - like_count: INTEGER NOT NULL DEFAULT 0
/// - created_at / updated_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
///
/// Categories and image URLs live in `post_categories` / `post_images`,
/// one row each, ordered by insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    /// Snowflake ID (primary key)
    pub id: i64,

    /// Author user ID
    pub author_id: i64,

    /// Post title
    pub title: String,

    /// Post body
    pub content: String,

    /// Thumbnail image URL
    pub thumbnail: Option<String>,

    /// Number of detail views
    pub view_count: i32,

    /// Denormalized like counter, kept in sync by toggle_like
    pub like_count: i32,

    /// Category names attached to the post
    pub categories: Vec<String>,

    /// Image URLs attached to the post, in display order
    pub images: Vec<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// Sort order for post listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostSort {
    /// Most recently created first
    #[default]
    Latest,
    /// Most viewed first
    Views,
    /// Most liked first
    Likes,
}

/// One post in a paged listing, joined with author and viewer state.
#[derive(Debug, Clone, Serialize)]
pub struct PostSummary {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub thumbnail: Option<String>,
    pub nickname: String,
    pub categories: Vec<String>,
    pub view_count: i32,
    pub like_count: i32,
    /// Whether the requesting user has liked this post (false for anonymous)
    pub liked: bool,
    /// Whether the requesting user has bookmarked this post (false for anonymous)
    pub bookmarked: bool,
    pub created_at: DateTime<Utc>,
}

/// A page of post summaries.
#[derive(Debug, Clone, Serialize)]
pub struct PostPage {
    pub posts: Vec<PostSummary>,
    /// True when a full page was returned and more rows may exist
    pub has_more: bool,
}

/// Result of a like/bookmark toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToggleOutcome {
    Added,
    Removed,
}

/// Repository trait for Post data access operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Find a post by ID, with categories and images loaded.
    async fn find_by_id(&self, id: i64) -> Result<Option<Post>, AppError>;

    /// Create a post along with its categories and images.
    async fn create(&self, post: &Post) -> Result<Post, AppError>;

    /// Update an existing post's title, content and thumbnail.
    async fn update(&self, post: &Post) -> Result<Post, AppError>;

    /// Replace the post's images wholesale.
    async fn replace_images(&self, id: i64, images: &[String]) -> Result<(), AppError>;

    /// Delete a post (cascades to side tables).
    async fn delete(&self, id: i64) -> Result<(), AppError>;

    /// Increment the view counter, returning the new value.
    async fn increment_views(&self, id: i64) -> Result<i32, AppError>;

    /// Toggle a like for the given user, keeping like_count in sync.
    async fn toggle_like(&self, user_id: i64, post_id: i64) -> Result<ToggleOutcome, AppError>;

    /// Toggle a bookmark for the given user.
    async fn toggle_bookmark(&self, user_id: i64, post_id: i64)
        -> Result<ToggleOutcome, AppError>;

    /// Whether the user has liked the post.
    async fn is_liked(&self, user_id: i64, post_id: i64) -> Result<bool, AppError>;

    /// Whether the user has bookmarked the post.
    async fn is_bookmarked(&self, user_id: i64, post_id: i64) -> Result<bool, AppError>;

    /// Paged listing with author nickname and per-viewer like/bookmark state.
    /// `viewer` is None for anonymous requests.
    async fn list_page(
        &self,
        page: u32,
        page_size: u32,
        sort: PostSort,
        viewer: Option<i64>,
    ) -> Result<PostPage, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("latest", PostSort::Latest)]
    #[test_case("views", PostSort::Views)]
    #[test_case("likes", PostSort::Likes)]
    fn test_post_sort_deserializes(input: &str, expected: PostSort) {
        let sort: PostSort = serde_json::from_str(&format!("\"{}\"", input)).unwrap();
        assert_eq!(sort, expected);
    }

    #[test]
    fn test_post_sort_default_is_latest() {
        assert_eq!(PostSort::default(), PostSort::Latest);
    }

    #[test]
    fn test_toggle_outcome_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ToggleOutcome::Added).unwrap(),
            "\"added\""
        );
        assert_eq!(
            serde_json::to_string(&ToggleOutcome::Removed).unwrap(),
            "\"removed\""
        );
    }
}
