pub mod comments;
pub mod error;
pub mod posts;
pub mod progress;
pub mod seed;
pub mod users;

pub use error::{ApiError, ApiResult};

use axum::{
    middleware,
    routing::{get, post},
    Extension, Router,
};
use serde::Deserialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::state::AppState;

/// `?page=` query, 1-based, ten items per page
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "first_page")]
    pub page: u32,
}

fn first_page() -> u32 {
    1
}

/// Parse a path id, naming the entity in the error
pub(crate) fn parse_id(raw: &str, what: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid {} ID", what)))
}

/// Build the full HTTP surface. Only the seed triggers are rate limited.
pub fn router(state: AppState, seed_limiter: RateLimiter) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let triggers = Router::new()
        .route("/seed/users", post(seed::seed_users))
        .route("/seed/posts", post(seed::seed_posts))
        .route("/seed/comments", post(seed::seed_comments))
        .route_layer(middleware::from_fn(rate_limit_middleware))
        .layer(Extension(seed_limiter));

    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Read routes
        .route("/users", get(users::list_users))
        .route("/users/count", get(users::count_users))
        .route("/users/:id", get(users::get_user))
        .route("/users/:id/posts", get(users::get_user_posts))
        .route("/posts", get(posts::list_posts))
        .route("/posts/:id", get(posts::get_post))
        .route("/posts/:id/comments", get(posts::get_post_comments))
        .route("/comments/:id", get(comments::get_comment))
        // Queue observability
        .route("/seed/stats", get(seed::get_stats))
        .route("/seed/failed", get(seed::get_failed))
        .route("/seed/:queue/retry", post(seed::retry_failed))
        // Progress stream
        .route("/progress", get(progress::stream_progress))
        .merge(triggers)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

async fn health_check() -> &'static str {
    "OK"
}
