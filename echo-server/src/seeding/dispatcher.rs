use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use echo_types::EntityKind;

use super::error::SeedResult;
use super::job::JobDescriptor;
use super::queue::JobQueue;

/// Single entry point for putting seed jobs on their queues.
///
/// Used by the HTTP trigger, the CLI, the scheduler and by workers fanning out
/// to the next stage of the cascade.
#[derive(Clone)]
pub struct SeedDispatcher {
    queue: Arc<dyn JobQueue>,
}

impl SeedDispatcher {
    pub fn new(queue: Arc<dyn JobQueue>) -> Self {
        Self { queue }
    }

    pub async fn seed_users(&self, count: i64) -> SeedResult<i64> {
        self.dispatch(JobDescriptor::users(count)).await
    }

    pub async fn seed_posts(&self, count: i64, user_id: Uuid) -> SeedResult<i64> {
        self.dispatch(JobDescriptor::posts(count, user_id)).await
    }

    pub async fn seed_comments(&self, count: i64, post_id: Uuid) -> SeedResult<i64> {
        self.dispatch(JobDescriptor::comments(count, post_id)).await
    }

    /// Externally triggered seeding run; the returned job id is the only
    /// acknowledgment, the outcome shows up in the queue state and logs.
    pub async fn trigger_seed(
        &self,
        entity: EntityKind,
        count: i64,
        parent_id: Option<Uuid>,
    ) -> SeedResult<i64> {
        let descriptor = JobDescriptor {
            kind: entity.job_kind(),
            count,
            parent_id,
        };
        let job_id = self.dispatch(descriptor).await?;
        info!(
            job_id,
            queue = descriptor.kind.queue_name(),
            count,
            "Seed run triggered"
        );
        Ok(job_id)
    }

    async fn dispatch(&self, descriptor: JobDescriptor) -> SeedResult<i64> {
        descriptor.validate()?;
        self.queue.enqueue(descriptor).await
    }
}
