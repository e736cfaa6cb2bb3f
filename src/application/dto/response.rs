//! Response DTOs
//!
//! Data structures for API response bodies.

use serde::Serialize;

use crate::application::services::{AuthTokens, PostDetail};
use crate::domain::{Discussion, Post, PostPage, ToggleOutcome, User};

/// Authentication tokens response
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub token_type: String,
}

impl From<AuthTokens> for TokenResponse {
    fn from(tokens: AuthTokens) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_in: tokens.expires_in,
            token_type: tokens.token_type,
        }
    }
}

/// Registration response (includes user and tokens)
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub token_type: String,
}

/// User response
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub nickname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub image_url: Option<String>,
    pub created_at: String,
}

impl UserResponse {
    pub fn from_user(user: User, include_email: bool) -> Self {
        Self {
            id: user.id.to_string(),
            nickname: user.nickname,
            email: if include_email { Some(user.email) } else { None },
            image_url: user.image_url,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// Availability check response
#[derive(Debug, Serialize)]
pub struct ExistsResponse {
    pub exists: bool,
}

/// Password reset verification response, carrying the temporary password
#[derive(Debug, Serialize)]
pub struct PasswordResetResponse {
    pub password: String,
}

/// Post detail response
#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub id: String,
    pub nickname: String,
    pub title: String,
    pub content: String,
    pub thumbnail: Option<String>,
    pub categories: Vec<String>,
    pub images: Vec<String>,
    pub view_count: i32,
    pub like_count: i32,
    pub liked: bool,
    pub bookmarked: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl PostResponse {
    pub fn from_detail(detail: PostDetail) -> Self {
        let PostDetail {
            post,
            nickname,
            liked,
            bookmarked,
        } = detail;
        Self {
            id: post.id.to_string(),
            nickname,
            title: post.title,
            content: post.content,
            thumbnail: post.thumbnail,
            categories: post.categories,
            images: post.images,
            view_count: post.view_count,
            like_count: post.like_count,
            liked,
            bookmarked,
            created_at: post.created_at.to_rfc3339(),
            updated_at: post.updated_at.to_rfc3339(),
        }
    }

    /// Response for freshly created or updated posts, where viewer state
    /// is trivially known.
    pub fn from_own_post(post: Post, nickname: String) -> Self {
        Self {
            id: post.id.to_string(),
            nickname,
            title: post.title,
            content: post.content,
            thumbnail: post.thumbnail,
            categories: post.categories,
            images: post.images,
            view_count: post.view_count,
            like_count: post.like_count,
            liked: false,
            bookmarked: false,
            created_at: post.created_at.to_rfc3339(),
            updated_at: post.updated_at.to_rfc3339(),
        }
    }
}

/// Paged post listing response
#[derive(Debug, Serialize)]
pub struct PostListResponse {
    pub posts: Vec<PostSummaryResponse>,
    pub has_more: bool,
}

/// One entry of the post listing
#[derive(Debug, Serialize)]
pub struct PostSummaryResponse {
    pub id: String,
    pub title: String,
    pub content: String,
    pub thumbnail: Option<String>,
    pub nickname: String,
    pub categories: Vec<String>,
    pub view_count: i32,
    pub like_count: i32,
    pub liked: bool,
    pub bookmarked: bool,
    pub created_at: String,
}

impl From<PostPage> for PostListResponse {
    fn from(page: PostPage) -> Self {
        Self {
            posts: page
                .posts
                .into_iter()
                .map(|p| PostSummaryResponse {
                    id: p.id.to_string(),
                    title: p.title,
                    content: p.content,
                    thumbnail: p.thumbnail,
                    nickname: p.nickname,
                    categories: p.categories,
                    view_count: p.view_count,
                    like_count: p.like_count,
                    liked: p.liked,
                    bookmarked: p.bookmarked,
                    created_at: p.created_at.to_rfc3339(),
                })
                .collect(),
            has_more: page.has_more,
        }
    }
}

/// Like/bookmark toggle response
#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub outcome: ToggleOutcome,
}

/// Discussion response
#[derive(Debug, Serialize)]
pub struct DiscussionResponse {
    pub id: String,
    pub author_id: String,
    pub title: String,
    pub progress: serde_json::Value,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Discussion> for DiscussionResponse {
    fn from(discussion: Discussion) -> Self {
        Self {
            id: discussion.id.to_string(),
            author_id: discussion.author_id.to_string(),
            title: discussion.title,
            progress: discussion.progress,
            created_at: discussion.created_at.to_rfc3339(),
            updated_at: discussion.updated_at.to_rfc3339(),
        }
    }
}
