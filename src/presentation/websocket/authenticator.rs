//! Session Authenticator
//!
//! Resolves an inbound connection's credential to a participant identity.
//! Anonymous connections are valid; authentication never fails a connect,
//! it only downgrades it.

use std::sync::Arc;

use jsonwebtoken::{decode, DecodingKey, Validation};

use crate::application::services::Claims;
use crate::domain::{Participant, UserRepository};

/// Resolves an optional bearer token into a participant identity.
pub struct SessionAuthenticator {
    user_repo: Arc<dyn UserRepository>,
    jwt_secret: String,
}

impl SessionAuthenticator {
    pub fn new(user_repo: Arc<dyn UserRepository>, jwt_secret: String) -> Self {
        Self {
            user_repo,
            jwt_secret,
        }
    }

    /// Resolve the credential, if any, to an identity.
    ///
    /// Returns None for missing, malformed or expired tokens and for
    /// tokens whose subject no longer exists. Never errors: a connection
    /// without identity proceeds with reduced capabilities.
    pub async fn authenticate(&self, token: Option<&str>) -> Option<Participant> {
        let token = token?;

        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .ok()?;

        let user_id: i64 = claims.sub.parse().ok()?;

        match self.user_repo.find_by_id(user_id).await {
            Ok(Some(user)) => Some(Participant {
                user_id: user.id,
                nickname: user.nickname,
            }),
            Ok(None) => {
                tracing::debug!(user_id, "Token subject no longer exists");
                None
            }
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Identity lookup failed, treating connection as anonymous");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    use crate::domain::{MockUserRepository, User};

    const SECRET: &str = "a-test-secret-that-is-long-enough!!";

    fn token_for(user_id: i64, secret: &str) -> String {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (now + Duration::minutes(30)).timestamp(),
            iat: now.timestamp(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_no_credential_is_anonymous() {
        let auth = SessionAuthenticator::new(Arc::new(MockUserRepository::new()), SECRET.into());

        assert!(auth.authenticate(None).await.is_none());
    }

    #[tokio::test]
    async fn test_valid_token_resolves_identity() {
        let mut repo = MockUserRepository::new();
        repo.expect_find_by_id().returning(|id| {
            Ok(Some(User {
                id,
                nickname: "alice".into(),
                ..User::default()
            }))
        });
        let auth = SessionAuthenticator::new(Arc::new(repo), SECRET.into());

        let identity = auth.authenticate(Some(&token_for(42, SECRET))).await.unwrap();

        assert_eq!(identity.user_id, 42);
        assert_eq!(identity.nickname, "alice");
    }

    #[tokio::test]
    async fn test_token_with_wrong_secret_is_anonymous() {
        let auth = SessionAuthenticator::new(Arc::new(MockUserRepository::new()), SECRET.into());

        let forged = token_for(42, "another-secret-that-is-long-enough");
        assert!(auth.authenticate(Some(&forged)).await.is_none());
    }

    #[tokio::test]
    async fn test_token_for_deleted_user_is_anonymous() {
        let mut repo = MockUserRepository::new();
        repo.expect_find_by_id().returning(|_| Ok(None));
        let auth = SessionAuthenticator::new(Arc::new(repo), SECRET.into());

        assert!(auth.authenticate(Some(&token_for(42, SECRET))).await.is_none());
    }
}
