//! # Domain Entities
//!
//! Core domain entities of the Agora server. All entities map directly to
//! their corresponding database tables.
//!
//! ## Core Entities
//!
//! - **User**: User account with authentication data and profile
//! - **Post**: A blog post with categories, images, likes and bookmarks
//! - **Discussion**: A discussion thread with a real-time chat room attached
//! - **ChatMessage**: A persisted chat message sent in a discussion room
//! - **Session**: User sessions for JWT refresh token management
//!
//! ## Repository Traits
//!
//! Each entity has an associated repository trait defining data access
//! operations. These traits are implemented in the infrastructure layer,
//! following the dependency inversion principle.

mod discussion;
mod message;
mod post;
mod session;
mod user;

// Re-export User entity and related types
pub use user::{User, UserRepository};

// Re-export Post entity and related types
pub use post::{Post, PostPage, PostRepository, PostSort, PostSummary, ToggleOutcome};

// Re-export Discussion entity and related types
pub use discussion::{Discussion, DiscussionRepository, Participant};

// Re-export ChatMessage entity and related types
pub use message::{ChatMessage, MessageRepository};

// Re-export Session entity and related types
pub use session::{Session, SessionRepository};

// Mock repositories for unit tests
#[cfg(test)]
pub use discussion::MockDiscussionRepository;
#[cfg(test)]
pub use message::MockMessageRepository;
#[cfg(test)]
pub use post::MockPostRepository;
#[cfg(test)]
pub use session::MockSessionRepository;
#[cfg(test)]
pub use user::MockUserRepository;
