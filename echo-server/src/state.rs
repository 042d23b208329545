use std::sync::Arc;
use std::time::Duration;

use crate::db::Database;
use crate::progress::ProgressHub;
use crate::seeding::{
    RecordFactory, SampleSource, SeedDispatcher, SqliteCounter, SqliteEntityStore,
    SqliteJobQueue, WorkerContext,
};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub queue: Arc<SqliteJobQueue>,
    pub dispatcher: SeedDispatcher,
    pub hub: ProgressHub,
}

impl AppState {
    pub fn new(db: Database, max_attempts: i64, poll_interval: Duration) -> Self {
        let queue = Arc::new(SqliteJobQueue::new(db.pool.clone(), max_attempts, poll_interval));
        let dispatcher = SeedDispatcher::new(queue.clone());
        Self {
            db,
            queue,
            dispatcher,
            hub: ProgressHub::new(),
        }
    }

    /// Wiring shared by the three seed workers
    pub fn worker_context(&self, source: Arc<dyn SampleSource>, job_timeout: Duration) -> WorkerContext {
        let counter = Arc::new(SqliteCounter::new(self.db.pool.clone()));
        WorkerContext {
            queue: self.queue.clone(),
            factory: RecordFactory::new(source, counter),
            store: Arc::new(SqliteEntityStore::new(self.db.pool.clone())),
            dispatcher: self.dispatcher.clone(),
            hub: self.hub.clone(),
            job_timeout,
        }
    }
}
