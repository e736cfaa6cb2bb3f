//! Post Repository Implementation
//!
//! PostgreSQL implementation of the PostRepository trait. Posts span the
//! `posts` table plus `post_categories`, `post_images`, `post_likes` and
//! `post_bookmarks`; multi-table writes run inside a transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Post, PostPage, PostRepository, PostSort, PostSummary, ToggleOutcome};
use crate::shared::error::AppError;

/// Database row representation matching the posts table schema.
#[derive(Debug, sqlx::FromRow)]
struct PostRow {
    id: i64,
    author_id: i64,
    title: String,
    content: String,
    thumbnail: Option<String>,
    view_count: i32,
    like_count: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PostRow {
    /// Convert database row to domain Post entity; side tables are loaded
    /// separately.
    fn into_post(self, categories: Vec<String>, images: Vec<String>) -> Post {
        Post {
            id: self.id,
            author_id: self.author_id,
            title: self.title,
            content: self.content,
            thumbnail: self.thumbnail,
            view_count: self.view_count,
            like_count: self.like_count,
            categories,
            images,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Listing row with author nickname, aggregated categories and viewer state.
#[derive(Debug, sqlx::FromRow)]
struct PostSummaryRow {
    id: i64,
    title: String,
    content: String,
    thumbnail: Option<String>,
    nickname: String,
    categories: Vec<String>,
    view_count: i32,
    like_count: i32,
    liked: bool,
    bookmarked: bool,
    created_at: DateTime<Utc>,
}

impl PostSummaryRow {
    fn into_summary(self) -> PostSummary {
        PostSummary {
            id: self.id,
            title: self.title,
            content: self.content,
            thumbnail: self.thumbnail,
            nickname: self.nickname,
            categories: self.categories,
            view_count: self.view_count,
            like_count: self.like_count,
            liked: self.liked,
            bookmarked: self.bookmarked,
            created_at: self.created_at,
        }
    }
}

/// PostgreSQL post repository implementation.
#[derive(Clone)]
pub struct PgPostRepository {
    pool: PgPool,
}

impl PgPostRepository {
    /// Create a new PgPostRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load category names for a post, in insertion order.
    async fn load_categories(&self, post_id: i64) -> Result<Vec<String>, AppError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT category FROM post_categories WHERE post_id = $1 ORDER BY category",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    /// Load image URLs for a post, in display order.
    async fn load_images(&self, post_id: i64) -> Result<Vec<String>, AppError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT image FROM post_images WHERE post_id = $1 ORDER BY position")
                .bind(post_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|r| r.0).collect())
    }
}

#[async_trait]
impl PostRepository for PgPostRepository {
    /// Find a post by ID, with categories and images loaded.
    async fn find_by_id(&self, id: i64) -> Result<Option<Post>, AppError> {
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT id, author_id, title, content, thumbnail, view_count, like_count,
                   created_at, updated_at
            FROM posts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let categories = self.load_categories(id).await?;
                let images = self.load_images(id).await?;
                Ok(Some(row.into_post(categories, images)))
            }
            None => Ok(None),
        }
    }

    /// Create a post along with its categories and images.
    async fn create(&self, post: &Post) -> Result<Post, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, PostRow>(
            r#"
            INSERT INTO posts (id, author_id, title, content, thumbnail)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, author_id, title, content, thumbnail, view_count, like_count,
                      created_at, updated_at
            "#,
        )
        .bind(post.id)
        .bind(post.author_id)
        .bind(&post.title)
        .bind(&post.content)
        .bind(&post.thumbnail)
        .fetch_one(&mut *tx)
        .await?;

        for category in &post.categories {
            sqlx::query(
                "INSERT INTO post_categories (post_id, category) VALUES ($1, $2)
                 ON CONFLICT DO NOTHING",
            )
            .bind(post.id)
            .bind(category)
            .execute(&mut *tx)
            .await?;
        }

        for (position, image) in post.images.iter().enumerate() {
            sqlx::query("INSERT INTO post_images (post_id, position, image) VALUES ($1, $2, $3)")
                .bind(post.id)
                .bind(position as i32)
                .bind(image)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(row.into_post(post.categories.clone(), post.images.clone()))
    }

    /// Update an existing post's title, content and thumbnail.
    async fn update(&self, post: &Post) -> Result<Post, AppError> {
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            UPDATE posts
            SET title = $2, content = $3, thumbnail = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING id, author_id, title, content, thumbnail, view_count, like_count,
                      created_at, updated_at
            "#,
        )
        .bind(post.id)
        .bind(&post.title)
        .bind(&post.content)
        .bind(&post.thumbnail)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Post {} not found", post.id)))?;

        let categories = self.load_categories(post.id).await?;
        let images = self.load_images(post.id).await?;
        Ok(row.into_post(categories, images))
    }

    /// Replace the post's images wholesale.
    async fn replace_images(&self, id: i64, images: &[String]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM post_images WHERE post_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        for (position, image) in images.iter().enumerate() {
            sqlx::query("INSERT INTO post_images (post_id, position, image) VALUES ($1, $2, $3)")
                .bind(id)
                .bind(position as i32)
                .bind(image)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Delete a post (cascades to side tables).
    async fn delete(&self, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Post {} not found", id)));
        }

        Ok(())
    }

    /// Increment the view counter, returning the new value.
    async fn increment_views(&self, id: i64) -> Result<i32, AppError> {
        let row: (i32,) = sqlx::query_as(
            "UPDATE posts SET view_count = view_count + 1 WHERE id = $1 RETURNING view_count",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Post {} not found", id)))?;

        Ok(row.0)
    }

    /// Toggle a like for the given user, keeping like_count in sync.
    async fn toggle_like(&self, user_id: i64, post_id: i64) -> Result<ToggleOutcome, AppError> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM post_likes WHERE user_id = $1 AND post_id = $2")
                .bind(user_id)
                .bind(post_id)
                .fetch_optional(&mut *tx)
                .await?;

        let outcome = if existing.is_some() {
            sqlx::query("DELETE FROM post_likes WHERE user_id = $1 AND post_id = $2")
                .bind(user_id)
                .bind(post_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("UPDATE posts SET like_count = like_count - 1 WHERE id = $1")
                .bind(post_id)
                .execute(&mut *tx)
                .await?;
            ToggleOutcome::Removed
        } else {
            sqlx::query("INSERT INTO post_likes (user_id, post_id) VALUES ($1, $2)")
                .bind(user_id)
                .bind(post_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("UPDATE posts SET like_count = like_count + 1 WHERE id = $1")
                .bind(post_id)
                .execute(&mut *tx)
                .await?;
            ToggleOutcome::Added
        };

        tx.commit().await?;
        Ok(outcome)
    }

    /// Toggle a bookmark for the given user.
    async fn toggle_bookmark(
        &self,
        user_id: i64,
        post_id: i64,
    ) -> Result<ToggleOutcome, AppError> {
        let existing: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM post_bookmarks WHERE user_id = $1 AND post_id = $2")
                .bind(user_id)
                .bind(post_id)
                .fetch_optional(&self.pool)
                .await?;

        if existing.is_some() {
            sqlx::query("DELETE FROM post_bookmarks WHERE user_id = $1 AND post_id = $2")
                .bind(user_id)
                .bind(post_id)
                .execute(&self.pool)
                .await?;
            Ok(ToggleOutcome::Removed)
        } else {
            sqlx::query("INSERT INTO post_bookmarks (user_id, post_id) VALUES ($1, $2)")
                .bind(user_id)
                .bind(post_id)
                .execute(&self.pool)
                .await?;
            Ok(ToggleOutcome::Added)
        }
    }

    /// Whether the user has liked the post.
    async fn is_liked(&self, user_id: i64, post_id: i64) -> Result<bool, AppError> {
        let exists: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM post_likes WHERE user_id = $1 AND post_id = $2)",
        )
        .bind(user_id)
        .bind(post_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists.0)
    }

    /// Whether the user has bookmarked the post.
    async fn is_bookmarked(&self, user_id: i64, post_id: i64) -> Result<bool, AppError> {
        let exists: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM post_bookmarks WHERE user_id = $1 AND post_id = $2)",
        )
        .bind(user_id)
        .bind(post_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists.0)
    }

    /// Paged listing with author nickname and per-viewer like/bookmark state.
    async fn list_page(
        &self,
        page: u32,
        page_size: u32,
        sort: PostSort,
        viewer: Option<i64>,
    ) -> Result<PostPage, AppError> {
        let order_by = match sort {
            PostSort::Latest => "p.created_at DESC",
            PostSort::Views => "p.view_count DESC, p.created_at DESC",
            PostSort::Likes => "p.like_count DESC, p.created_at DESC",
        };

        let offset = (page.saturating_sub(1) as i64) * page_size as i64;

        let query = format!(
            r#"
            SELECT p.id, p.title, p.content, p.thumbnail, u.nickname,
                   COALESCE(
                       ARRAY_AGG(c.category ORDER BY c.category)
                           FILTER (WHERE c.category IS NOT NULL),
                       '{{}}'
                   ) AS categories,
                   p.view_count, p.like_count,
                   EXISTS(
                       SELECT 1 FROM post_likes pl
                       WHERE pl.post_id = p.id AND pl.user_id = $3
                   ) AS liked,
                   EXISTS(
                       SELECT 1 FROM post_bookmarks pb
                       WHERE pb.post_id = p.id AND pb.user_id = $3
                   ) AS bookmarked,
                   p.created_at
            FROM posts p
            JOIN users u ON u.id = p.author_id
            LEFT JOIN post_categories c ON c.post_id = p.id
            GROUP BY p.id, u.nickname
            ORDER BY {}
            LIMIT $1 OFFSET $2
            "#,
            order_by
        );

        let rows = sqlx::query_as::<_, PostSummaryRow>(&query)
            .bind(page_size as i64)
            .bind(offset)
            .bind(viewer)
            .fetch_all(&self.pool)
            .await?;

        let has_more = rows.len() as u32 == page_size;
        let posts = rows.into_iter().map(|r| r.into_summary()).collect();

        Ok(PostPage { posts, has_more })
    }
}
