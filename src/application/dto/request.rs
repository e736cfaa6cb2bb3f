//! Request DTOs
//!
//! Data structures for API request bodies.

use serde::Deserialize;
use validator::Validate;

use crate::domain::PostSort;

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

/// Registration request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 2, max = 32, message = "Nickname must be 2-32 characters"))]
    pub nickname: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

/// Refresh token request
#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Availability check query (email)
#[derive(Debug, Deserialize, Validate)]
pub struct EmailExistsQuery {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

/// Availability check query (nickname)
#[derive(Debug, Deserialize, Validate)]
pub struct NicknameExistsQuery {
    #[validate(length(min = 2, max = 32, message = "Nickname must be 2-32 characters"))]
    pub nickname: String,
}

/// Update profile request
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 2, max = 32, message = "Nickname must be 2-32 characters"))]
    pub nickname: Option<String>,

    pub image_url: Option<String>,
}

/// Update password request
#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePasswordRequest {
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

/// Start of the password reset flow
#[derive(Debug, Deserialize, Validate)]
pub struct PasswordResetRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

/// Completion of the password reset flow
#[derive(Debug, Deserialize, Validate)]
pub struct PasswordResetVerifyRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Code must not be empty"))]
    pub code: String,
}

/// Create post request
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePostRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: String,

    #[validate(length(min = 1, message = "Content must not be empty"))]
    pub content: String,

    #[serde(default)]
    pub categories: Vec<String>,

    #[serde(default)]
    pub images: Vec<String>,

    pub thumbnail: Option<String>,
}

/// Update post request
#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePostRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: String,

    #[validate(length(min = 1, message = "Content must not be empty"))]
    pub content: String,

    /// When present, replaces the post's images wholesale
    pub images: Option<Vec<String>>,

    pub thumbnail: Option<String>,
}

/// Post listing query parameters
#[derive(Debug, Deserialize)]
pub struct ListPostsQuery {
    #[serde(default = "default_page")]
    pub page: u32,

    #[serde(default = "default_page_size")]
    pub page_size: u32,

    #[serde(default)]
    pub sort: PostSort,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    10
}

/// Create discussion request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateDiscussionRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: String,
}

/// Update discussion request
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateDiscussionRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_rejects_bad_email() {
        let request = RegisterRequest {
            email: "not-an-email".into(),
            nickname: "tester".into(),
            password: "password123".into(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_register_request_rejects_short_password() {
        let request = RegisterRequest {
            email: "a@b.com".into(),
            nickname: "tester".into(),
            password: "short".into(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_list_posts_query_defaults() {
        let query: ListPostsQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.page, 1);
        assert_eq!(query.page_size, 10);
        assert_eq!(query.sort, PostSort::Latest);
    }
}
