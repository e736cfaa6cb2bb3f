//! Cache Module
//!
//! Redis connection management and the services built on top of it:
//! the presence store used by the discussion rooms and the short-lived
//! verification codes used by the password reset flow.

mod presence_store;
mod verification_cache;

pub use presence_store::{PresenceStore, RedisPresenceStore};
pub use verification_cache::VerificationCodeStore;

#[cfg(test)]
pub use presence_store::MockPresenceStore;

use redis::aio::ConnectionManager;
use redis::Client;
use tracing::{info, instrument};

use crate::config::RedisSettings;

/// Creates a Redis connection manager with automatic reconnection.
///
/// The connection manager handles connection pooling and automatic
/// reconnection when the connection is lost.
///
/// # Arguments
/// * `settings` - Redis configuration settings
///
/// # Returns
/// * `Ok(ConnectionManager)` - On successful connection
/// * `Err(redis::RedisError)` - If connection fails
#[instrument(skip(settings), fields(url = %settings.url))]
pub async fn create_redis_client(
    settings: &RedisSettings,
) -> Result<ConnectionManager, redis::RedisError> {
    info!("Connecting to Redis...");
    let client = Client::open(settings.url.as_str())?;
    let manager = ConnectionManager::new(client).await?;
    info!("Redis connection established");
    Ok(manager)
}

/// Cache key helpers for different data types.
///
/// Use these to ensure consistent key naming across the application.
pub mod keys {
    /// Prefix for password-reset verification codes (e.g., "reset:code:<email>")
    pub const RESET_CODE: &str = "reset:code:";

    /// Generates the presence key for a nickname.
    ///
    /// The key format is part of the wire-level contract with other
    /// consumers of the store and must not change.
    #[inline]
    pub fn presence(nickname: &str) -> String {
        format!("chat:nickname:{}:socketId", nickname)
    }

    /// Generates a verification code key for an email address.
    #[inline]
    pub fn reset_code(email: &str) -> String {
        format!("{}{}", RESET_CODE, email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presence_key_format() {
        assert_eq!(keys::presence("alice"), "chat:nickname:alice:socketId");
    }

    #[test]
    fn test_reset_code_key_format() {
        assert_eq!(keys::reset_code("a@b.c"), "reset:code:a@b.c");
    }
}
