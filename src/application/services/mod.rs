//! Application Services
//!
//! Business logic services that coordinate domain operations.
//!
//! ## Available Services
//!
//! - **AuthService**: Authentication, JWT tokens, refresh sessions
//! - **UserService**: Profile management and the password reset flow
//! - **PostService**: Post CRUD, likes and bookmarks
//! - **DiscussionService**: Discussion CRUD for the HTTP surface

pub mod auth_service;
pub mod discussion_service;
pub mod post_service;
pub mod user_service;

// Re-export auth service types
pub use auth_service::{AuthError, AuthService, AuthServiceImpl, AuthTokens, Claims};

// Re-export user service types
pub use user_service::{LogMailer, Mailer, UserError, UserService, UserServiceImpl};

// Re-export post service types
pub use post_service::{PostDetail, PostError, PostService, PostServiceImpl};

// Re-export discussion service types
pub use discussion_service::{DiscussionError, DiscussionService, DiscussionServiceImpl};
