//! User Handlers

use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::application::dto::request::{
    PasswordResetRequest, PasswordResetVerifyRequest, UpdatePasswordRequest, UpdateProfileRequest,
};
use crate::application::dto::response::{PasswordResetResponse, UserResponse};
use crate::application::services::{UserError, UserService, UserServiceImpl};
use crate::infrastructure::cache::VerificationCodeStore;
use crate::infrastructure::repositories::PgUserRepository;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Build the user service for this request
fn user_service(state: &AppState) -> UserServiceImpl<PgUserRepository> {
    UserServiceImpl::new(
        Arc::new(PgUserRepository::new(state.db.clone())),
        VerificationCodeStore::new(
            state.redis.clone(),
            state.settings.password_reset.code_ttl_seconds,
        ),
        state.mailer.clone(),
        state.settings.password_reset.code_length,
    )
}

fn map_user_error(e: UserError) -> AppError {
    match e {
        UserError::UserNotFound => AppError::NotFound("User not found".into()),
        UserError::NicknameExists => AppError::Conflict("Nickname already exists".into()),
        UserError::CodeMismatch => {
            AppError::BadRequest("Verification code does not match".into())
        }
        e => AppError::Internal(e.to_string()),
    }
}

/// Get current authenticated user
pub async fn get_current_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<UserResponse>, AppError> {
    let user = user_service(&state)
        .get_profile(auth.user_id)
        .await
        .map_err(map_user_error)?;

    Ok(Json(UserResponse::from_user(user, true)))
}

/// Update current user profile
pub async fn update_current_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, AppError> {
    body.validate()
        .map_err(crate::shared::validation::validation_error)?;

    let user = user_service(&state)
        .update_profile(auth.user_id, body.nickname.as_deref(), body.image_url.as_deref())
        .await
        .map_err(map_user_error)?;

    Ok(Json(UserResponse::from_user(user, true)))
}

/// Change password for the authenticated user
pub async fn update_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<UpdatePasswordRequest>,
) -> Result<StatusCode, AppError> {
    body.validate()
        .map_err(crate::shared::validation::validation_error)?;

    user_service(&state)
        .update_password(auth.user_id, &body.password)
        .await
        .map_err(map_user_error)?;

    Ok(StatusCode::NO_CONTENT)
}

/// Delete the authenticated user's account
pub async fn delete_current_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<StatusCode, AppError> {
    user_service(&state)
        .delete_account(auth.user_id)
        .await
        .map_err(map_user_error)?;

    Ok(StatusCode::NO_CONTENT)
}

/// Start the password reset flow (sends a verification code)
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(body): Json<PasswordResetRequest>,
) -> Result<StatusCode, AppError> {
    body.validate()
        .map_err(crate::shared::validation::validation_error)?;

    user_service(&state)
        .request_password_reset(&body.email)
        .await
        .map_err(|e| match e {
            UserError::UserNotFound => {
                AppError::BadRequest("No users match this email".into())
            }
            e => map_user_error(e),
        })?;

    Ok(StatusCode::ACCEPTED)
}

/// Complete the password reset flow (verifies the code, returns a
/// temporary password)
pub async fn verify_password_reset(
    State(state): State<AppState>,
    Json(body): Json<PasswordResetVerifyRequest>,
) -> Result<Json<PasswordResetResponse>, AppError> {
    body.validate()
        .map_err(crate::shared::validation::validation_error)?;

    let password = user_service(&state)
        .verify_reset_code(&body.email, &body.code)
        .await
        .map_err(map_user_error)?;

    Ok(Json(PasswordResetResponse { password }))
}
