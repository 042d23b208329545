use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::{
    api::{ApiError, ApiResult},
    state::AppState,
};
use echo_types::{
    EntityKind, JobKind, QueueStats, RetryResponse, SeedAccepted, SeedJob, SeedRequest,
};

#[derive(Debug, Deserialize)]
pub struct FailedQuery {
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    50
}

async fn trigger(
    state: &AppState,
    entity: EntityKind,
    request: SeedRequest,
) -> ApiResult<(StatusCode, Json<SeedAccepted>)> {
    let job_id = state
        .dispatcher
        .trigger_seed(entity, request.count, request.parent_id)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SeedAccepted {
            job_id,
            queue: entity.job_kind().queue_name().to_string(),
        }),
    ))
}

/// POST /seed/users - Queue a user seed run; each user cascades into posts and comments
pub async fn seed_users(
    State(state): State<AppState>,
    Json(request): Json<SeedRequest>,
) -> ApiResult<(StatusCode, Json<SeedAccepted>)> {
    trigger(&state, EntityKind::User, request).await
}

/// POST /seed/posts - Queue posts for an existing user (`parent_id`)
pub async fn seed_posts(
    State(state): State<AppState>,
    Json(request): Json<SeedRequest>,
) -> ApiResult<(StatusCode, Json<SeedAccepted>)> {
    trigger(&state, EntityKind::Post, request).await
}

/// POST /seed/comments - Queue comments for an existing post (`parent_id`)
pub async fn seed_comments(
    State(state): State<AppState>,
    Json(request): Json<SeedRequest>,
) -> ApiResult<(StatusCode, Json<SeedAccepted>)> {
    trigger(&state, EntityKind::Comment, request).await
}

/// GET /seed/stats - Job counts by status for every queue
pub async fn get_stats(State(state): State<AppState>) -> ApiResult<Json<Vec<QueueStats>>> {
    Ok(Json(state.queue.stats()?))
}

/// GET /seed/failed?limit= - Most recently failed jobs
pub async fn get_failed(
    State(state): State<AppState>,
    Query(query): Query<FailedQuery>,
) -> ApiResult<Json<Vec<SeedJob>>> {
    let limit = query.limit.clamp(1, 500);
    Ok(Json(state.queue.failed_jobs(limit)?))
}

/// POST /seed/:queue/retry - Put a queue's failed jobs back in line
pub async fn retry_failed(
    State(state): State<AppState>,
    Path(queue): Path<String>,
) -> ApiResult<Json<RetryResponse>> {
    let kind = JobKind::parse_queue(&queue)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown queue {}", queue)))?;

    let requeued = state.queue.retry_failed(kind)?;

    Ok(Json(RetryResponse {
        queue: kind.queue_name().to_string(),
        requeued,
    }))
}
