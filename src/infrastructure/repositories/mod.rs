//! Repository Implementations
//!
//! PostgreSQL implementations of domain repository traits.
//!
//! This module provides concrete implementations of the repository traits
//! defined in the domain layer. Each repository handles data access for
//! a specific entity type.
//!
//! ## Available Repositories
//!
//! - **UserRepository** - User account management
//! - **PostRepository** - Posts with categories, images, likes and bookmarks
//! - **DiscussionRepository** - Discussions, membership and ban lists
//! - **MessageRepository** - Chat message persistence
//! - **SessionRepository** - Refresh token sessions

pub mod discussion_repository;
pub mod message_repository;
pub mod post_repository;
pub mod session_repository;
pub mod user_repository;

pub use discussion_repository::PgDiscussionRepository;
pub use message_repository::PgMessageRepository;
pub use post_repository::PgPostRepository;
pub use session_repository::PgSessionRepository;
pub use user_repository::PgUserRepository;
