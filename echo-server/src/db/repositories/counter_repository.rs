use anyhow::{bail, Context, Result};
use rusqlite::OptionalExtension;

use crate::db::DbPool;

/// Persisted per-entity counters backing unique seed indices
pub struct CounterRepository {
    pool: DbPool,
}

impl CounterRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Advance the counter for `entity` by `n` and return its previous value.
    ///
    /// The read and the increment happen in one upsert statement, so two
    /// callers can never observe the same previous value.
    pub fn reserve(&self, entity: &str, n: i64) -> Result<i64> {
        if n < 0 {
            bail!("Cannot reserve a negative range ({}) for {}", n, entity);
        }

        let conn = self.pool.get()?;
        let new_count: i64 = conn
            .query_row(
                "INSERT INTO counters (entity, count) VALUES (?1, ?2)
                 ON CONFLICT(entity) DO UPDATE SET count = counters.count + excluded.count
                 RETURNING count",
                (entity, n),
                |row| row.get(0),
            )
            .with_context(|| format!("Failed to reserve {} indices for {}", n, entity))?;

        Ok(new_count - n)
    }

    /// Current counter value, 0 if nothing was reserved yet
    pub fn current(&self, entity: &str) -> Result<i64> {
        let conn = self.pool.get()?;
        let count: Option<i64> = conn
            .query_row(
                "SELECT count FROM counters WHERE entity = ?",
                [entity],
                |row| row.get(0),
            )
            .optional()?;
        Ok(count.unwrap_or(0))
    }
}
