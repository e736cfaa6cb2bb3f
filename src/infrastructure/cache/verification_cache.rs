//! Verification Code Store
//!
//! Short-lived password-reset codes keyed by email, with store-level expiry.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, instrument};

use super::keys;
use crate::shared::error::AppError;

/// Redis-backed store for one-time verification codes.
#[derive(Clone)]
pub struct VerificationCodeStore {
    conn: ConnectionManager,
    ttl_seconds: u64,
}

impl VerificationCodeStore {
    pub fn new(conn: ConnectionManager, ttl_seconds: u64) -> Self {
        Self { conn, ttl_seconds }
    }

    /// Store a code for the email, replacing any outstanding one.
    #[instrument(skip(self, code), level = "debug")]
    pub async fn put(&self, email: &str, code: &str) -> Result<(), AppError> {
        let key = keys::reset_code(email);
        let mut conn = self.conn.clone();

        let _: () = conn.set_ex(&key, code, self.ttl_seconds).await?;
        debug!(key = %key, ttl = self.ttl_seconds, "Verification code stored");

        Ok(())
    }

    /// Fetch the outstanding code for the email, if not expired.
    #[instrument(skip(self), level = "debug")]
    pub async fn get(&self, email: &str) -> Result<Option<String>, AppError> {
        let key = keys::reset_code(email);
        let mut conn = self.conn.clone();

        let value: Option<String> = conn.get(&key).await?;
        Ok(value)
    }

    /// Remove the code once consumed.
    #[instrument(skip(self), level = "debug")]
    pub async fn remove(&self, email: &str) -> Result<(), AppError> {
        let key = keys::reset_code(email);
        let mut conn = self.conn.clone();

        let _: u64 = conn.del(&key).await?;
        Ok(())
    }
}

impl std::fmt::Debug for VerificationCodeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationCodeStore")
            .field("ttl_seconds", &self.ttl_seconds)
            .finish_non_exhaustive()
    }
}
