mod user_repository;
mod post_repository;
mod comment_repository;
mod counter_repository;
mod job_repository;

pub use user_repository::UserRepository;
pub use post_repository::PostRepository;
pub use comment_repository::CommentRepository;
pub use counter_repository::CounterRepository;
pub use job_repository::JobRepository;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use serde::de::DeserializeOwned;
use uuid::Uuid;

/// Rows per page on list queries
pub const PAGE_SIZE: u32 = 10;

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

pub(crate) fn uuid_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let value: String = row.get(idx)?;
    Uuid::parse_str(&value).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn optional_uuid_column(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<Uuid>> {
    let value: Option<String> = row.get(idx)?;
    value
        .map(|s| Uuid::parse_str(&s).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

pub(crate) fn timestamp_column(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<DateTime<Utc>> {
    let value: String = row.get(idx)?;
    value
        .parse::<DateTime<Utc>>()
        .map_err(|e| conversion_error(idx, e))
}

pub(crate) fn json_column<T: DeserializeOwned>(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<T> {
    let value: String = row.get(idx)?;
    serde_json::from_str(&value).map_err(|e| conversion_error(idx, e))
}

/// Row offset for a 1-based page number
pub(crate) fn page_offset(page: u32) -> i64 {
    i64::from(page.max(1) - 1) * i64::from(PAGE_SIZE)
}
