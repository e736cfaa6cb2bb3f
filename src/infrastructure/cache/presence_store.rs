//! Presence Store
//!
//! Maps a participant nickname to the identifier of their current live
//! connection. One entry per nickname, last write wins. Entries are shared
//! global state whose lifecycle is tied to the most recent successful
//! authentication, not to any single connection, so deletion must be
//! guarded: a connection may only release an entry that still addresses it.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::keys;
use crate::shared::error::AppError;

/// Nickname -> live connection addressing, consumed by the room coordinator.
///
/// Single-key atomicity only; no ordering guarantee across keys.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PresenceStore: Send + Sync {
    /// Register `connection_id` as the live connection for `nickname`,
    /// overwriting any prior entry (last connection wins).
    async fn register(&self, nickname: &str, connection_id: Uuid) -> Result<(), AppError>;

    /// Resolve the live connection for a nickname, if any.
    async fn lookup(&self, nickname: &str) -> Result<Option<Uuid>, AppError>;

    /// Delete the entry for `nickname`, but only if it still addresses
    /// `connection_id`. Returns true when the entry was removed.
    ///
    /// The guard keeps a superseded connection's disconnect from evicting
    /// the entry a newer connection just wrote.
    async fn release(&self, nickname: &str, connection_id: Uuid) -> Result<bool, AppError>;
}

/// Redis-backed presence store.
#[derive(Clone)]
pub struct RedisPresenceStore {
    conn: ConnectionManager,
}

impl RedisPresenceStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl PresenceStore for RedisPresenceStore {
    #[instrument(skip(self), level = "debug")]
    async fn register(&self, nickname: &str, connection_id: Uuid) -> Result<(), AppError> {
        let key = keys::presence(nickname);
        let mut conn = self.conn.clone();

        let _: () = conn.set(&key, connection_id.to_string()).await?;
        debug!(key = %key, connection_id = %connection_id, "Presence registered");

        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn lookup(&self, nickname: &str) -> Result<Option<Uuid>, AppError> {
        let key = keys::presence(nickname);
        let mut conn = self.conn.clone();

        let value: Option<String> = conn.get(&key).await?;

        Ok(value.and_then(|v| v.parse::<Uuid>().ok()))
    }

    #[instrument(skip(self), level = "debug")]
    async fn release(&self, nickname: &str, connection_id: Uuid) -> Result<bool, AppError> {
        let key = keys::presence(nickname);
        let mut conn = self.conn.clone();

        // Check-before-delete: the store only guarantees single-key
        // atomicity, and a stale delete is worse than a leaked entry.
        let current: Option<String> = conn.get(&key).await?;
        match current {
            Some(value) if value == connection_id.to_string() => {
                let deleted: u64 = conn.del(&key).await?;
                debug!(key = %key, connection_id = %connection_id, "Presence released");
                Ok(deleted > 0)
            }
            Some(_) => {
                debug!(key = %key, connection_id = %connection_id, "Presence entry superseded, not deleting");
                Ok(false)
            }
            None => Ok(false),
        }
    }
}

impl std::fmt::Debug for RedisPresenceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisPresenceStore").finish_non_exhaustive()
    }
}
