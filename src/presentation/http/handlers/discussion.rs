//! Discussion Handlers
//!
//! HTTP CRUD for discussions. The real-time room itself is served by the
//! WebSocket gateway.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::application::dto::request::{CreateDiscussionRequest, UpdateDiscussionRequest};
use crate::application::dto::response::DiscussionResponse;
use crate::application::services::{DiscussionError, DiscussionService, DiscussionServiceImpl};
use crate::infrastructure::repositories::PgDiscussionRepository;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Build the discussion service for this request
fn discussion_service(state: &AppState) -> DiscussionServiceImpl<PgDiscussionRepository> {
    DiscussionServiceImpl::new(
        Arc::new(PgDiscussionRepository::new(state.db.clone())),
        state.snowflake.clone(),
    )
}

fn map_discussion_error(e: DiscussionError) -> AppError {
    match e {
        DiscussionError::DiscussionNotFound => {
            AppError::NotFound("Discussion not found".into())
        }
        DiscussionError::NotAuthor => {
            AppError::Forbidden("Not the author of this discussion".into())
        }
        e => AppError::Internal(e.to_string()),
    }
}

/// Create a new discussion
pub async fn create_discussion(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<CreateDiscussionRequest>,
) -> Result<(StatusCode, Json<DiscussionResponse>), AppError> {
    body.validate()
        .map_err(crate::shared::validation::validation_error)?;

    let discussion = discussion_service(&state)
        .create_discussion(auth.user_id, &body.title)
        .await
        .map_err(map_discussion_error)?;

    Ok((StatusCode::CREATED, Json(DiscussionResponse::from(discussion))))
}

/// Get a discussion
pub async fn get_discussion(
    State(state): State<AppState>,
    Path(discussion_id): Path<i64>,
) -> Result<Json<DiscussionResponse>, AppError> {
    let discussion = discussion_service(&state)
        .get_discussion(discussion_id)
        .await
        .map_err(map_discussion_error)?;

    Ok(Json(DiscussionResponse::from(discussion)))
}

/// Update a discussion's metadata (author only)
pub async fn update_discussion(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(discussion_id): Path<i64>,
    Json(body): Json<UpdateDiscussionRequest>,
) -> Result<Json<DiscussionResponse>, AppError> {
    body.validate()
        .map_err(crate::shared::validation::validation_error)?;

    let discussion = discussion_service(&state)
        .update_discussion(discussion_id, auth.user_id, &body.title)
        .await
        .map_err(map_discussion_error)?;

    Ok(Json(DiscussionResponse::from(discussion)))
}
