//! Post Handlers

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::application::dto::request::{CreatePostRequest, ListPostsQuery, UpdatePostRequest};
use crate::application::dto::response::{
    PostListResponse, PostResponse, ToggleResponse,
};
use crate::application::services::{PostError, PostService, PostServiceImpl};
use crate::domain::UserRepository;
use crate::infrastructure::repositories::{PgPostRepository, PgUserRepository};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Build the post service for this request
fn post_service(state: &AppState) -> PostServiceImpl<PgPostRepository, PgUserRepository> {
    PostServiceImpl::new(
        Arc::new(PgPostRepository::new(state.db.clone())),
        Arc::new(PgUserRepository::new(state.db.clone())),
        state.snowflake.clone(),
    )
}

fn map_post_error(e: PostError) -> AppError {
    match e {
        PostError::PostNotFound => AppError::NotFound("Post not found".into()),
        PostError::NotAuthor => AppError::Forbidden("Not the author of this post".into()),
        e => AppError::Internal(e.to_string()),
    }
}

/// Create a new post
pub async fn create_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<PostResponse>), AppError> {
    body.validate()
        .map_err(crate::shared::validation::validation_error)?;

    let post = post_service(&state)
        .create_post(
            auth.user_id,
            &body.title,
            &body.content,
            body.categories,
            body.images,
            body.thumbnail,
        )
        .await
        .map_err(map_post_error)?;

    let nickname = PgUserRepository::new(state.db.clone())
        .find_by_id(auth.user_id)
        .await?
        .map(|u| u.nickname)
        .unwrap_or_default();

    Ok((
        StatusCode::CREATED,
        Json(PostResponse::from_own_post(post, nickname)),
    ))
}

/// Get post detail (counts the view)
pub async fn get_post(
    State(state): State<AppState>,
    Extension(auth): Extension<Option<AuthUser>>,
    Path(post_id): Path<i64>,
) -> Result<Json<PostResponse>, AppError> {
    let detail = post_service(&state)
        .get_post(post_id, auth.map(|a| a.user_id))
        .await
        .map_err(map_post_error)?;

    Ok(Json(PostResponse::from_detail(detail)))
}

/// Update a post (author only)
pub async fn update_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(post_id): Path<i64>,
    Json(body): Json<UpdatePostRequest>,
) -> Result<Json<PostResponse>, AppError> {
    body.validate()
        .map_err(crate::shared::validation::validation_error)?;

    let post = post_service(&state)
        .update_post(
            post_id,
            auth.user_id,
            &body.title,
            &body.content,
            body.images,
            body.thumbnail,
        )
        .await
        .map_err(map_post_error)?;

    let nickname = PgUserRepository::new(state.db.clone())
        .find_by_id(auth.user_id)
        .await?
        .map(|u| u.nickname)
        .unwrap_or_default();

    Ok(Json(PostResponse::from_own_post(post, nickname)))
}

/// Delete a post (author only)
pub async fn delete_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(post_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    post_service(&state)
        .delete_post(post_id, auth.user_id)
        .await
        .map_err(map_post_error)?;

    Ok(StatusCode::NO_CONTENT)
}

/// Paged post listing
pub async fn list_posts(
    State(state): State<AppState>,
    Extension(auth): Extension<Option<AuthUser>>,
    Query(query): Query<ListPostsQuery>,
) -> Result<Json<PostListResponse>, AppError> {
    let page = post_service(&state)
        .list_posts(
            query.page,
            query.page_size.clamp(1, 50),
            query.sort,
            auth.map(|a| a.user_id),
        )
        .await
        .map_err(map_post_error)?;

    Ok(Json(PostListResponse::from(page)))
}

/// Toggle a like on a post
pub async fn toggle_like(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(post_id): Path<i64>,
) -> Result<Json<ToggleResponse>, AppError> {
    let outcome = post_service(&state)
        .toggle_like(auth.user_id, post_id)
        .await
        .map_err(map_post_error)?;

    Ok(Json(ToggleResponse { outcome }))
}

/// Toggle a bookmark on a post
pub async fn toggle_bookmark(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(post_id): Path<i64>,
) -> Result<Json<ToggleResponse>, AppError> {
    let outcome = post_service(&state)
        .toggle_bookmark(auth.user_id, post_id)
        .await
        .map_err(map_post_error)?;

    Ok(Json(ToggleResponse { outcome }))
}
