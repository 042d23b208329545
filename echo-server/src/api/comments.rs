use axum::{
    extract::{Path, State},
    Json,
};

use crate::{
    api::{parse_id, ApiError, ApiResult},
    db::repositories::CommentRepository,
    state::AppState,
};
use echo_types::Comment;

/// GET /comments/:id
pub async fn get_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<String>,
) -> ApiResult<Json<Comment>> {
    let comment_id = parse_id(&comment_id, "comment")?;
    let comment_repo = CommentRepository::new(state.db.pool.clone());

    let comment = comment_repo
        .get_by_id(&comment_id)?
        .ok_or_else(|| ApiError::NotFound("Comment not found".to_string()))?;

    Ok(Json(comment))
}
