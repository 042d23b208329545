//! Durable seed queues.
//!
//! Every job kind has its own named queue (`user-seed`, `post-seed`,
//! `comment-seed`). Jobs live in the `seed_jobs` table, so a queue survives a
//! restart; FIFO order is the row id order within one queue.
//!
//! ```text
//! enqueue ──► INSERT pending ──► notify the queue's consumer
//!
//! consume ──► claim oldest pending (atomic UPDATE … RETURNING)
//!         └─► nothing? wait for a notify or the poll interval, try again
//! ```
//!
//! The poll interval picks up jobs inserted by other processes (the `seed`
//! CLI command), which cannot reach this process's notifiers.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::{debug, info};

use echo_types::{JobKind, JobStatus, QueueStats, SeedJob};

use super::error::{SeedError, SeedResult};
use super::job::{ClaimedJob, JobDescriptor};
use crate::db::repositories::JobRepository;
use crate::db::DbPool;

/// Queue operations used by the dispatcher and the workers
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Append a job to its kind's queue and return the job id
    async fn enqueue(&self, descriptor: JobDescriptor) -> SeedResult<i64>;

    /// Claim the oldest pending job of a queue without waiting
    async fn try_claim(&self, kind: JobKind) -> SeedResult<Option<ClaimedJob>>;

    /// Claim the oldest pending job of a queue, waiting until one exists
    async fn consume(&self, kind: JobKind) -> SeedResult<ClaimedJob>;

    async fn mark_completed(&self, job_id: i64) -> SeedResult<()>;

    /// Report a failed attempt; returns `Pending` when the job will be retried
    async fn mark_failed(&self, job_id: i64, error: &str) -> SeedResult<JobStatus>;
}

/// SQLite-backed implementation of [`JobQueue`]
pub struct SqliteJobQueue {
    jobs: JobRepository,
    max_attempts: i64,
    poll_interval: Duration,
    wakeups: [Notify; 3],
}

impl SqliteJobQueue {
    pub fn new(pool: DbPool, max_attempts: i64, poll_interval: Duration) -> Self {
        Self {
            jobs: JobRepository::new(pool),
            max_attempts: max_attempts.max(1),
            poll_interval,
            wakeups: [Notify::new(), Notify::new(), Notify::new()],
        }
    }

    fn wakeup(&self, kind: JobKind) -> &Notify {
        match kind {
            JobKind::UserSeed => &self.wakeups[0],
            JobKind::PostSeed => &self.wakeups[1],
            JobKind::CommentSeed => &self.wakeups[2],
        }
    }

    /// Return jobs a crashed process left running to their queues
    pub fn requeue_stalled(&self) -> SeedResult<usize> {
        let count = self.jobs.requeue_stalled().map_err(SeedError::queue)?;
        if count > 0 {
            info!("Requeued {} stalled seed jobs", count);
        }
        Ok(count)
    }

    pub fn stats(&self) -> SeedResult<Vec<QueueStats>> {
        JobKind::ALL
            .iter()
            .map(|kind| self.jobs.stats(*kind).map_err(SeedError::queue))
            .collect()
    }

    pub fn failed_jobs(&self, limit: i64) -> SeedResult<Vec<SeedJob>> {
        self.jobs.recent_failures(limit).map_err(SeedError::queue)
    }

    /// Give every failed job of a queue a new attempt budget
    pub fn retry_failed(&self, kind: JobKind) -> SeedResult<usize> {
        let count = self.jobs.retry_failed(kind).map_err(SeedError::queue)?;
        if count > 0 {
            info!(queue = kind.queue_name(), "Requeued {} failed jobs", count);
            self.wakeup(kind).notify_one();
        }
        Ok(count)
    }

    pub fn job(&self, job_id: i64) -> SeedResult<Option<SeedJob>> {
        self.jobs.get(job_id).map_err(SeedError::queue)
    }

    pub fn jobs(&self, kind: JobKind, status: JobStatus) -> SeedResult<Vec<SeedJob>> {
        self.jobs.list(kind, status).map_err(SeedError::queue)
    }
}

#[async_trait]
impl JobQueue for SqliteJobQueue {
    async fn enqueue(&self, descriptor: JobDescriptor) -> SeedResult<i64> {
        descriptor.validate()?;

        let job_id = self
            .jobs
            .insert(
                descriptor.kind,
                descriptor.count,
                descriptor.parent_id,
                self.max_attempts,
            )
            .map_err(SeedError::queue)?;

        debug!(
            job_id,
            queue = descriptor.kind.queue_name(),
            count = descriptor.count,
            "Enqueued seed job"
        );
        self.wakeup(descriptor.kind).notify_one();
        Ok(job_id)
    }

    async fn try_claim(&self, kind: JobKind) -> SeedResult<Option<ClaimedJob>> {
        self.jobs
            .claim_next(kind)
            .map_err(SeedError::queue)?
            .map(ClaimedJob::try_from)
            .transpose()
    }

    async fn consume(&self, kind: JobKind) -> SeedResult<ClaimedJob> {
        loop {
            if let Some(job) = self.try_claim(kind).await? {
                return Ok(job);
            }

            tokio::select! {
                _ = self.wakeup(kind).notified() => {}
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    async fn mark_completed(&self, job_id: i64) -> SeedResult<()> {
        self.jobs.mark_completed(job_id).map_err(SeedError::queue)
    }

    async fn mark_failed(&self, job_id: i64, error: &str) -> SeedResult<JobStatus> {
        let status = self
            .jobs
            .mark_failed(job_id, error)
            .map_err(SeedError::queue)?;

        if status == JobStatus::Pending {
            if let Some(job) = self.jobs.get(job_id).map_err(SeedError::queue)? {
                if let Some(kind) = JobKind::parse_queue(&job.queue) {
                    self.wakeup(kind).notify_one();
                }
            }
        }
        Ok(status)
    }
}
