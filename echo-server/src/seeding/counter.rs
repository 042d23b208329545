use async_trait::async_trait;

use echo_types::EntityKind;

use super::error::{SeedError, SeedResult};
use crate::db::repositories::CounterRepository;
use crate::db::DbPool;

/// Hands out non-overlapping ranges of seed indices per entity kind
#[async_trait]
pub trait UniquenessCounter: Send + Sync {
    /// Reserve `n` indices and return the counter value before the reservation.
    /// The caller owns `start + 1 ..= start + n`.
    async fn reserve(&self, entity: EntityKind, n: i64) -> SeedResult<i64>;
}

pub struct SqliteCounter {
    counters: CounterRepository,
}

impl SqliteCounter {
    pub fn new(pool: DbPool) -> Self {
        Self {
            counters: CounterRepository::new(pool),
        }
    }

    pub fn current(&self, entity: EntityKind) -> SeedResult<i64> {
        self.counters
            .current(entity.as_str())
            .map_err(|e| SeedError::reservation(entity, e))
    }
}

#[async_trait]
impl UniquenessCounter for SqliteCounter {
    async fn reserve(&self, entity: EntityKind, n: i64) -> SeedResult<i64> {
        self.counters
            .reserve(entity.as_str(), n)
            .map_err(|e| SeedError::reservation(entity, e))
    }
}
