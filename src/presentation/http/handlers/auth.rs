//! Authentication Handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::application::dto::request::{
    EmailExistsQuery, LoginRequest, NicknameExistsQuery, RefreshTokenRequest, RegisterRequest,
};
use crate::application::dto::response::{
    ExistsResponse, RegisterResponse, TokenResponse, UserResponse,
};
use crate::application::services::{AuthError, AuthService, AuthServiceImpl};
use crate::domain::UserRepository;
use crate::infrastructure::repositories::{PgSessionRepository, PgUserRepository};
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Build the auth service for this request
fn auth_service(state: &AppState) -> AuthServiceImpl<PgUserRepository, PgSessionRepository> {
    AuthServiceImpl::new(
        Arc::new(PgUserRepository::new(state.db.clone())),
        Arc::new(PgSessionRepository::new(state.db.clone())),
        state.snowflake.clone(),
        state.settings.jwt.clone(),
    )
}

/// Register a new user
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    body.validate()
        .map_err(crate::shared::validation::validation_error)?;

    let (user, tokens) = auth_service(&state)
        .register(&body.email, &body.nickname, &body.password)
        .await
        .map_err(|e| match e {
            AuthError::EmailExists => AppError::Conflict("Email already exists".into()),
            AuthError::NicknameExists => AppError::Conflict("Nickname already exists".into()),
            e => AppError::Internal(e.to_string()),
        })?;

    let response = RegisterResponse {
        user: UserResponse::from_user(user, true),
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        expires_in: tokens.expires_in,
        token_type: tokens.token_type,
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// Login with credentials
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    body.validate()
        .map_err(crate::shared::validation::validation_error)?;

    let tokens = auth_service(&state)
        .authenticate(&body.email, &body.password)
        .await
        .map_err(|e| match e {
            AuthError::InvalidCredentials => {
                AppError::Unauthorized("Invalid email or password".into())
            }
            e => AppError::Internal(e.to_string()),
        })?;

    Ok(Json(TokenResponse::from(tokens)))
}

/// Refresh access token
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(body): Json<RefreshTokenRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let tokens = auth_service(&state)
        .refresh_token(&body.refresh_token)
        .await
        .map_err(|e| match e {
            AuthError::SessionNotFound => AppError::Unauthorized("Session not found".into()),
            AuthError::TokenExpired => AppError::Unauthorized("Session expired".into()),
            e => AppError::Internal(e.to_string()),
        })?;

    Ok(Json(TokenResponse::from(tokens)))
}

/// Logout (revoke refresh token)
pub async fn logout(
    State(state): State<AppState>,
    Json(body): Json<RefreshTokenRequest>,
) -> Result<StatusCode, AppError> {
    auth_service(&state)
        .revoke_token(&body.refresh_token)
        .await
        .map_err(|e| match e {
            AuthError::SessionNotFound => AppError::Unauthorized("Session not found".into()),
            e => AppError::Internal(e.to_string()),
        })?;

    Ok(StatusCode::NO_CONTENT)
}

/// Signup availability check: email
pub async fn email_exists(
    State(state): State<AppState>,
    Query(query): Query<EmailExistsQuery>,
) -> Result<Json<ExistsResponse>, AppError> {
    query
        .validate()
        .map_err(crate::shared::validation::validation_error)?;

    let exists = PgUserRepository::new(state.db.clone())
        .email_exists(&query.email)
        .await?;

    Ok(Json(ExistsResponse { exists }))
}

/// Signup availability check: nickname
pub async fn nickname_exists(
    State(state): State<AppState>,
    Query(query): Query<NicknameExistsQuery>,
) -> Result<Json<ExistsResponse>, AppError> {
    query
        .validate()
        .map_err(crate::shared::validation::validation_error)?;

    let exists = PgUserRepository::new(state.db.clone())
        .nickname_exists(&query.nickname)
        .await?;

    Ok(Json(ExistsResponse { exists }))
}
