//! Seed workers, one per queue.
//!
//! ```text
//! SeedWorker(kind)
//!     │
//!     ├─► consume(kind)            wait for the next job of this queue
//!     ├─► factory.synthesize_*     fetch templates, reserve indices
//!     ├─► store.create_*           one record at a time, stop at first error
//!     │       ├─► user:  publish user total, enqueue post-seed(10, user)
//!     │       └─► post:  enqueue comment-seed(10, post)
//!     └─► mark_completed / mark_failed
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use echo_types::{JobKind, JobStatus};

use super::dispatcher::SeedDispatcher;
use super::error::{SeedError, SeedResult};
use super::factory::RecordFactory;
use super::job::{ClaimedJob, COMMENTS_PER_POST, POSTS_PER_USER};
use super::queue::JobQueue;
use super::store::EntityStore;
use crate::progress::{count_update, ProgressHub, COUNT_UPDATE_TOPIC};

/// Pause after the queue itself fails before asking it again
const QUEUE_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Pause before the second and last attempt at writing a job's outcome
const STATUS_WRITE_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Everything a worker needs, shared by the three workers
#[derive(Clone)]
pub struct WorkerContext {
    pub queue: Arc<dyn JobQueue>,
    pub factory: RecordFactory,
    pub store: Arc<dyn EntityStore>,
    pub dispatcher: SeedDispatcher,
    pub hub: ProgressHub,
    pub job_timeout: Duration,
}

/// Result of handling one job
#[derive(Debug)]
pub struct JobReport {
    pub job_id: i64,
    /// Queue status after the outcome was reported; `Pending` means a retry is scheduled
    pub status: JobStatus,
    /// Records committed by this attempt, also when it failed part way
    pub created: usize,
    pub error: Option<SeedError>,
}

pub struct SeedWorker {
    kind: JobKind,
    ctx: WorkerContext,
}

impl SeedWorker {
    pub fn new(kind: JobKind, ctx: WorkerContext) -> Self {
        Self { kind, ctx }
    }

    /// Consume jobs until `shutdown` fires. A job already being processed is
    /// finished first.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(queue = self.kind.queue_name(), "Seed worker started");

        loop {
            let claimed = tokio::select! {
                _ = shutdown.cancelled() => break,
                claimed = self.ctx.queue.consume(self.kind) => claimed,
            };

            match claimed {
                Ok(job) => {
                    if let Err(e) = self.handle(job).await {
                        error!(queue = self.kind.queue_name(), error = %e, "Failed to record job outcome");
                    }
                }
                Err(e) => {
                    error!(queue = self.kind.queue_name(), error = %e, "Failed to consume from queue");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(QUEUE_ERROR_BACKOFF) => {}
                    }
                }
            }
        }

        info!(queue = self.kind.queue_name(), "Seed worker stopped");
    }

    /// Handle the oldest pending job of this worker's queue, if there is one
    pub async fn process_next(&self) -> SeedResult<Option<JobReport>> {
        match self.ctx.queue.try_claim(self.kind).await? {
            Some(job) => self.handle(job).await.map(Some),
            None => Ok(None),
        }
    }

    /// Process a claimed job and report the outcome to the queue
    pub async fn handle(&self, job: ClaimedJob) -> SeedResult<JobReport> {
        info!(
            job_id = job.id,
            queue = self.kind.queue_name(),
            count = job.descriptor.count,
            attempt = job.attempt,
            "Processing seed job"
        );

        let committed = AtomicUsize::new(0);
        let outcome =
            match tokio::time::timeout(self.ctx.job_timeout, self.process(&job, &committed)).await {
                Ok(result) => result,
                Err(_) => Err(SeedError::Timeout(self.ctx.job_timeout)),
            };
        let created = committed.load(Ordering::SeqCst);

        match outcome {
            Ok(()) => {
                self.write_status(job.id, || self.ctx.queue.mark_completed(job.id))
                    .await?;
                info!(
                    job_id = job.id,
                    queue = self.kind.queue_name(),
                    created,
                    "Seed job completed"
                );
                Ok(JobReport {
                    job_id: job.id,
                    status: JobStatus::Completed,
                    created,
                    error: None,
                })
            }
            Err(err) => {
                error!(
                    job_id = job.id,
                    queue = self.kind.queue_name(),
                    attempt = job.attempt,
                    created,
                    error = %err,
                    "Seed job failed"
                );
                let message = err.to_string();
                let status = self
                    .write_status(job.id, || self.ctx.queue.mark_failed(job.id, &message))
                    .await?;
                if status == JobStatus::Pending {
                    warn!(job_id = job.id, "Seed job will be retried");
                }
                Ok(JobReport {
                    job_id: job.id,
                    status,
                    created,
                    error: Some(err),
                })
            }
        }
    }

    /// Write a job outcome to the queue, trying once more if the first write
    /// fails. A job whose outcome is never written stays `running` until the
    /// next `serve` start requeues it.
    async fn write_status<T, F, Fut>(&self, job_id: i64, write: F) -> SeedResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = SeedResult<T>>,
    {
        match write().await {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!(job_id, error = %e, "Failed to record job outcome, retrying");
                tokio::time::sleep(STATUS_WRITE_RETRY_DELAY).await;
                write().await
            }
        }
    }

    /// Materialize and persist the job's records, counting each committed one
    /// in `committed`. A user's post job is enqueued before the progress
    /// update, so a timeout there never strands a committed user.
    async fn process(&self, job: &ClaimedJob, committed: &AtomicUsize) -> SeedResult<()> {
        let descriptor = job.descriptor;
        if descriptor.kind != self.kind {
            return Err(SeedError::InvalidJob(format!(
                "{} job delivered to the {} worker",
                descriptor.kind.queue_name(),
                self.kind.queue_name()
            )));
        }
        descriptor.validate()?;
        let count = descriptor.count as usize;

        match self.kind {
            JobKind::UserSeed => {
                let users = self.ctx.factory.synthesize_users(count).await?;
                for new_user in &users {
                    let user = self.ctx.store.create_user(new_user).await?;
                    committed.fetch_add(1, Ordering::SeqCst);
                    self.ctx.dispatcher.seed_posts(POSTS_PER_USER, user.id).await?;
                    self.publish_user_total().await;
                }
            }
            JobKind::PostSeed => {
                let user_id = descriptor.require_parent()?;
                let posts = self.ctx.factory.synthesize_posts(count, user_id).await?;
                for new_post in &posts {
                    let post = self.ctx.store.create_post(new_post).await?;
                    committed.fetch_add(1, Ordering::SeqCst);
                    self.ctx
                        .dispatcher
                        .seed_comments(COMMENTS_PER_POST, post.id)
                        .await?;
                }
            }
            JobKind::CommentSeed => {
                let post_id = descriptor.require_parent()?;
                let comments = self.ctx.factory.synthesize_comments(count, post_id).await?;
                for new_comment in &comments {
                    self.ctx.store.create_comment(new_comment).await?;
                    committed.fetch_add(1, Ordering::SeqCst);
                }
            }
        }
        Ok(())
    }

    /// Best effort: a failed count is logged and skipped, never fails the job
    async fn publish_user_total(&self) {
        match self.ctx.store.count_users().await {
            Ok(total) => {
                let observers = self
                    .ctx
                    .hub
                    .publish(COUNT_UPDATE_TOPIC, count_update(total))
                    .await;
                debug!(total, observers, "Published user count");
            }
            Err(e) => warn!(error = %e, "Skipping progress update"),
        }
    }
}
