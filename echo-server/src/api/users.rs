use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::{
    api::{parse_id, ApiError, ApiResult, PageQuery},
    db::repositories::{PostRepository, UserRepository},
    state::AppState,
};
use echo_types::{CountResponse, Post, User};

/// GET /users?page= - One page of users in seed order
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Vec<User>>> {
    let user_repo = UserRepository::new(state.db.pool.clone());
    Ok(Json(user_repo.list(query.page)?))
}

/// GET /users/count - Total number of users
pub async fn count_users(State(state): State<AppState>) -> ApiResult<Json<CountResponse>> {
    let user_repo = UserRepository::new(state.db.pool.clone());
    Ok(Json(CountResponse {
        total: user_repo.count()?,
    }))
}

/// GET /users/:id
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<User>> {
    let user_id = parse_id(&user_id, "user")?;
    let user_repo = UserRepository::new(state.db.pool.clone());

    let user = user_repo
        .get_by_id(&user_id)?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

/// GET /users/:id/posts - Every post seeded for a user
pub async fn get_user_posts(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Vec<Post>>> {
    let user_id = parse_id(&user_id, "user")?;

    let pool = state.db.pool.clone();
    let user_repo = UserRepository::new(pool.clone());
    let post_repo = PostRepository::new(pool);

    if user_repo.get_by_id(&user_id)?.is_none() {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    Ok(Json(post_repo.get_by_user(&user_id)?))
}
