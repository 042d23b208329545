use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::{
    api::{parse_id, ApiError, ApiResult, PageQuery},
    db::repositories::{CommentRepository, PostRepository},
    state::AppState,
};
use echo_types::{Comment, Post};

/// GET /posts?page= - One page of posts in seed order
pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Vec<Post>>> {
    let post_repo = PostRepository::new(state.db.pool.clone());
    Ok(Json(post_repo.list(query.page)?))
}

/// GET /posts/:id
pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> ApiResult<Json<Post>> {
    let post_id = parse_id(&post_id, "post")?;
    let post_repo = PostRepository::new(state.db.pool.clone());

    let post = post_repo
        .get_by_id(&post_id)?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;

    Ok(Json(post))
}

/// GET /posts/:id/comments?page= - One page of a post's comments
pub async fn get_post_comments(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Vec<Comment>>> {
    let post_id = parse_id(&post_id, "post")?;

    let pool = state.db.pool.clone();
    let post_repo = PostRepository::new(pool.clone());
    let comment_repo = CommentRepository::new(pool);

    if post_repo.get_by_id(&post_id)?.is_none() {
        return Err(ApiError::NotFound("Post not found".to_string()));
    }

    Ok(Json(comment_repo.list_by_post(&post_id, query.page)?))
}
