//! Route Configuration
//!
//! Configures all HTTP routes for the API.

use axum::{
    middleware,
    response::IntoResponse,
    routing::{delete, get, patch, post},
    Router,
};

use super::handlers;
use crate::infrastructure::metrics;
use crate::presentation::middleware::{auth_middleware, logging, optional_auth_middleware};
use crate::presentation::websocket::ws_handler;
use crate::startup::AppState;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_routes(state.clone()))
        // WebSocket gateway endpoint
        .route("/gateway", get(ws_handler))
        // Health check endpoints
        .route("/health", get(handlers::health::health_check))
        .route("/health/live", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
        // Prometheus metrics endpoint
        .route("/metrics", get(metrics_handler))
        // Per-request Prometheus counters
        .layer(middleware::from_fn(logging::track_metrics))
        .with_state(state)
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    let metrics = metrics::gather_metrics();
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics,
    )
}

/// API v1 routes
fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_routes())
        .nest("/users", user_routes(state.clone()))
        .nest("/posts", post_routes(state.clone()))
        .nest("/discussions", discussion_routes(state))
}

/// Authentication routes (public)
fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route("/refresh", post(handlers::auth::refresh_token))
        .route("/logout", post(handlers::auth::logout))
        .route("/email-exists", get(handlers::auth::email_exists))
        .route("/nickname-exists", get(handlers::auth::nickname_exists))
}

/// User routes (profile endpoints protected, reset flow public)
fn user_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/@me", get(handlers::user::get_current_user))
        .route("/@me", patch(handlers::user::update_current_user))
        .route("/@me", delete(handlers::user::delete_current_user))
        .route("/@me/password", patch(handlers::user::update_password))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        .merge(protected)
        .route(
            "/password-reset",
            post(handlers::user::request_password_reset),
        )
        .route(
            "/password-reset/verify",
            post(handlers::user::verify_password_reset),
        )
}

/// Post routes (reads allow anonymous viewers, writes require auth)
fn post_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/", post(handlers::post::create_post))
        .route("/{post_id}", patch(handlers::post::update_post))
        .route("/{post_id}", delete(handlers::post::delete_post))
        .route("/{post_id}/like", post(handlers::post::toggle_like))
        .route("/{post_id}/bookmark", post(handlers::post::toggle_bookmark))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let public = Router::new()
        .route("/", get(handlers::post::list_posts))
        .route("/{post_id}", get(handlers::post::get_post))
        .route_layer(middleware::from_fn_with_state(
            state,
            optional_auth_middleware,
        ));

    protected.merge(public)
}

/// Discussion routes
fn discussion_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/", post(handlers::discussion::create_discussion))
        .route(
            "/{discussion_id}",
            patch(handlers::discussion::update_discussion),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        .merge(protected)
        .route("/{discussion_id}", get(handlers::discussion::get_discussion))
}
