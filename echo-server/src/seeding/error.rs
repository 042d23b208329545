use std::time::Duration;

use echo_types::EntityKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SeedError {
    /// Sample source unreachable or returned something unusable
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Counter store unavailable; nothing was persisted
    #[error("Reservation error for {entity:?}: {message}")]
    Reservation { entity: EntityKind, message: String },

    #[error("Persistence error for {entity:?}: {message}")]
    Persistence { entity: EntityKind, message: String },

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Invalid job: {0}")]
    InvalidJob(String),

    #[error("Job timed out after {0:?}")]
    Timeout(Duration),
}

impl SeedError {
    pub fn persistence(entity: EntityKind, err: anyhow::Error) -> Self {
        SeedError::Persistence {
            entity,
            message: format!("{:#}", err),
        }
    }

    pub fn reservation(entity: EntityKind, err: anyhow::Error) -> Self {
        SeedError::Reservation {
            entity,
            message: format!("{:#}", err),
        }
    }

    pub fn queue(err: anyhow::Error) -> Self {
        SeedError::Queue(format!("{:#}", err))
    }
}

impl From<reqwest::Error> for SeedError {
    fn from(err: reqwest::Error) -> Self {
        SeedError::Fetch(err.to_string())
    }
}

pub type SeedResult<T> = Result<T, SeedError>;
