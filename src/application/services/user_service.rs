//! User Service
//!
//! Profile management, password changes and the mail-verification
//! password reset flow. Mail delivery itself sits behind the [`Mailer`]
//! port; the default implementation only logs the code.

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use rand::Rng;

use crate::domain::{User, UserRepository};
use crate::infrastructure::cache::VerificationCodeStore;
use crate::shared::error::AppError;

/// Characters used for verification codes
const CODE_CHARSET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Characters used for generated temporary passwords
const PASSWORD_CHARSET: &[u8] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const PASSWORD_SPECIAL_CHARSET: &[u8] = b"!@#$%^&*()";

/// Outbound mail port. Delivery mechanics are not this crate's concern.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send a password-reset verification code to the address.
    async fn send_verification_code(&self, email: &str, code: &str) -> Result<(), AppError>;
}

/// Mailer that only logs; stands in where no SMTP relay is configured.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_verification_code(&self, email: &str, code: &str) -> Result<(), AppError> {
        tracing::info!(email = %email, code = %code, "Verification code issued (log mailer)");
        Ok(())
    }
}

/// User service errors
#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("User not found")]
    UserNotFound,

    #[error("Nickname already exists")]
    NicknameExists,

    #[error("Verification code does not match")]
    CodeMismatch,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// User service trait for dependency injection
#[async_trait]
pub trait UserService: Send + Sync {
    /// Fetch a user's profile.
    async fn get_profile(&self, user_id: i64) -> Result<User, UserError>;

    /// Update nickname and/or profile image. Fields left as None keep
    /// their current value.
    async fn update_profile(
        &self,
        user_id: i64,
        nickname: Option<&str>,
        image_url: Option<&str>,
    ) -> Result<User, UserError>;

    /// Change the password for an authenticated user.
    async fn update_password(&self, user_id: i64, password: &str) -> Result<(), UserError>;

    /// Delete the account.
    async fn delete_account(&self, user_id: i64) -> Result<(), UserError>;

    /// Start the password reset flow: store a short-lived code and hand
    /// it to the mailer.
    async fn request_password_reset(&self, email: &str) -> Result<(), UserError>;

    /// Complete the reset flow: verify the code, set a generated
    /// temporary password and return it.
    async fn verify_reset_code(&self, email: &str, code: &str) -> Result<String, UserError>;
}

/// UserService implementation
pub struct UserServiceImpl<U>
where
    U: UserRepository,
{
    user_repo: Arc<U>,
    codes: VerificationCodeStore,
    mailer: Arc<dyn Mailer>,
    code_length: usize,
}

impl<U> UserServiceImpl<U>
where
    U: UserRepository,
{
    /// Create a new UserServiceImpl
    pub fn new(
        user_repo: Arc<U>,
        codes: VerificationCodeStore,
        mailer: Arc<dyn Mailer>,
        code_length: usize,
    ) -> Self {
        Self {
            user_repo,
            codes,
            mailer,
            code_length,
        }
    }

    /// Hash a password using Argon2id
    fn hash_password(password: &str) -> Result<String, UserError> {
        let salt = SaltString::generate(&mut OsRng);

        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| UserError::Internal(format!("Password hashing failed: {}", e)))
    }

    /// Generate a random verification code
    fn generate_code(length: usize) -> String {
        let mut rng = rand::rng();
        (0..length)
            .map(|_| CODE_CHARSET[rng.random_range(0..CODE_CHARSET.len())] as char)
            .collect()
    }

    /// Generate a temporary password: six alphanumerics plus three
    /// specials, mirroring the shape required by signup validation.
    fn generate_password() -> String {
        let mut rng = rand::rng();
        let mut password: String = (0..6)
            .map(|_| PASSWORD_CHARSET[rng.random_range(0..PASSWORD_CHARSET.len())] as char)
            .collect();
        for _ in 0..3 {
            password.push(
                PASSWORD_SPECIAL_CHARSET[rng.random_range(0..PASSWORD_SPECIAL_CHARSET.len())]
                    as char,
            );
        }
        password
    }
}

#[async_trait]
impl<U> UserService for UserServiceImpl<U>
where
    U: UserRepository + 'static,
{
    async fn get_profile(&self, user_id: i64) -> Result<User, UserError> {
        self.user_repo
            .find_by_id(user_id)
            .await
            .map_err(|e| UserError::Internal(e.to_string()))?
            .ok_or(UserError::UserNotFound)
    }

    async fn update_profile(
        &self,
        user_id: i64,
        nickname: Option<&str>,
        image_url: Option<&str>,
    ) -> Result<User, UserError> {
        let mut current = self.get_profile(user_id).await?;

        // A changed nickname must stay unique
        if let Some(nickname) = nickname {
            if nickname != current.nickname
                && self
                    .user_repo
                    .nickname_exists(nickname)
                    .await
                    .map_err(|e| UserError::Internal(e.to_string()))?
            {
                return Err(UserError::NicknameExists);
            }
            current.nickname = nickname.to_string();
        }
        if let Some(image_url) = image_url {
            current.image_url = Some(image_url.to_string());
        }

        self.user_repo
            .update(&current)
            .await
            .map_err(|e| UserError::Internal(e.to_string()))
    }

    async fn update_password(&self, user_id: i64, password: &str) -> Result<(), UserError> {
        let hash = Self::hash_password(password)?;

        self.user_repo
            .update_password(user_id, &hash)
            .await
            .map_err(|e| match e {
                AppError::NotFound(_) => UserError::UserNotFound,
                e => UserError::Internal(e.to_string()),
            })
    }

    async fn delete_account(&self, user_id: i64) -> Result<(), UserError> {
        self.user_repo.delete(user_id).await.map_err(|e| match e {
            AppError::NotFound(_) => UserError::UserNotFound,
            e => UserError::Internal(e.to_string()),
        })
    }

    async fn request_password_reset(&self, email: &str) -> Result<(), UserError> {
        // Only registered addresses get a code
        self.user_repo
            .find_by_email(email)
            .await
            .map_err(|e| UserError::Internal(e.to_string()))?
            .ok_or(UserError::UserNotFound)?;

        let code = Self::generate_code(self.code_length);

        self.codes
            .put(email, &code)
            .await
            .map_err(|e| UserError::Internal(e.to_string()))?;

        self.mailer
            .send_verification_code(email, &code)
            .await
            .map_err(|e| UserError::Internal(e.to_string()))?;

        Ok(())
    }

    async fn verify_reset_code(&self, email: &str, code: &str) -> Result<String, UserError> {
        let stored = self
            .codes
            .get(email)
            .await
            .map_err(|e| UserError::Internal(e.to_string()))?;

        match stored {
            Some(stored) if stored == code => {}
            _ => return Err(UserError::CodeMismatch),
        }

        let user = self
            .user_repo
            .find_by_email(email)
            .await
            .map_err(|e| UserError::Internal(e.to_string()))?
            .ok_or(UserError::UserNotFound)?;

        let password = Self::generate_password();
        let hash = Self::hash_password(&password)?;

        self.user_repo
            .update_password(user.id, &hash)
            .await
            .map_err(|e| UserError::Internal(e.to_string()))?;

        // One code, one reset
        self.codes
            .remove(email)
            .await
            .map_err(|e| UserError::Internal(e.to_string()))?;

        Ok(password)
    }
}
