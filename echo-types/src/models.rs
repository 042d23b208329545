use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::enums::JobStatus;

// Custom serde module for DateTime to ensure RFC3339 string format
mod datetime_format {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = date.to_rfc3339();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse::<DateTime<Utc>>().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geo {
    pub lat: String,
    pub lng: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub suite: String,
    pub city: String,
    pub zipcode: String,
    pub geo: Geo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub name: String,
    pub catch_phrase: String,
    pub bs: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Uniqueness index assigned by the seed pipeline
    pub seed_index: i64,
    pub name: String,
    pub username: String,
    pub email: String,
    pub phone: String,
    pub website: String,
    pub address: Address,
    pub company: Company,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub seed_index: i64,
    pub user_id: Uuid,
    pub title: String,
    pub body: String,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub seed_index: i64,
    pub post_id: Uuid,
    pub name: String,
    pub email: String,
    pub body: String,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
}

// Creation payloads produced by the record factory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUser {
    pub seed_index: i64,
    pub name: String,
    pub username: String,
    pub email: String,
    pub phone: String,
    pub website: String,
    pub address: Address,
    pub company: Company,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPost {
    pub seed_index: i64,
    pub user_id: Uuid,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewComment {
    pub seed_index: i64,
    pub post_id: Uuid,
    pub name: String,
    pub email: String,
    pub body: String,
}

/// Durable unit of work on a seed queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedJob {
    pub id: i64,
    pub queue: String,
    pub count: i64,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    pub status: JobStatus,
    pub attempts: i64,
    pub max_attempts: i64,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "datetime_format")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueStats {
    pub queue: String,
    pub pending: i64,
    pub running: i64,
    pub completed: i64,
    pub failed: i64,
}

// Request/Response types for API
#[derive(Debug, Serialize, Deserialize)]
pub struct SeedRequest {
    pub count: i64,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SeedAccepted {
    pub job_id: i64,
    pub queue: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RetryResponse {
    pub queue: String,
    pub requeued: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub total: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub details: Option<String>,
}
