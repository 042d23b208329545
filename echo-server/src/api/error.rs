use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use echo_types::ErrorResponse;

use crate::seeding::SeedError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    TooManyRequests(String),
    ServiceUnavailable(String),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, details) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not Found", Some(msg)),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "Bad Request", Some(msg)),
            ApiError::TooManyRequests(msg) => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too Many Requests",
                Some(msg),
            ),
            ApiError::ServiceUnavailable(msg) => {
                tracing::error!("Service unavailable: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Service Unavailable",
                    Some("The seed queue is unavailable".to_string()),
                )
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error",
                    Some("An unexpected error occurred".to_string()),
                )
            }
        };

        let error_response = ErrorResponse {
            error: message.to_string(),
            details,
        };

        (status, Json(error_response)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalError(format!("{:#}", err))
    }
}

impl From<SeedError> for ApiError {
    fn from(err: SeedError) -> Self {
        match err {
            SeedError::InvalidJob(msg) => ApiError::BadRequest(msg),
            SeedError::Queue(msg) => ApiError::ServiceUnavailable(msg),
            other => ApiError::InternalError(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_errors_map_to_status() {
        let invalid: ApiError = SeedError::InvalidJob("count must be positive".to_string()).into();
        assert_eq!(invalid.into_response().status(), StatusCode::BAD_REQUEST);

        let queue: ApiError = SeedError::Queue("database is locked".to_string()).into();
        assert_eq!(queue.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);

        let fetch: ApiError = SeedError::Fetch("timeout".to_string()).into();
        assert_eq!(fetch.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
