use echo_types::{JobKind, SeedJob};
use uuid::Uuid;

use super::error::{SeedError, SeedResult};

/// Templates returned by one sample source call
pub const PAGE_SIZE: usize = 10;
/// Posts seeded for every new user
pub const POSTS_PER_USER: i64 = 10;
/// Comments seeded for every new post
pub const COMMENTS_PER_POST: i64 = 10;
/// Upper bound on a single job's count
pub const MAX_SEED_COUNT: i64 = 10_000;

/// What a job asks for: a kind, how many records, and the parent they hang off
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobDescriptor {
    pub kind: JobKind,
    pub count: i64,
    pub parent_id: Option<Uuid>,
}

impl JobDescriptor {
    pub fn users(count: i64) -> Self {
        Self {
            kind: JobKind::UserSeed,
            count,
            parent_id: None,
        }
    }

    pub fn posts(count: i64, user_id: Uuid) -> Self {
        Self {
            kind: JobKind::PostSeed,
            count,
            parent_id: Some(user_id),
        }
    }

    pub fn comments(count: i64, post_id: Uuid) -> Self {
        Self {
            kind: JobKind::CommentSeed,
            count,
            parent_id: Some(post_id),
        }
    }

    pub fn validate(&self) -> SeedResult<()> {
        if self.count < 1 || self.count > MAX_SEED_COUNT {
            return Err(SeedError::InvalidJob(format!(
                "count must be between 1 and {} (got {})",
                MAX_SEED_COUNT, self.count
            )));
        }

        match (self.kind.requires_parent(), self.parent_id) {
            (true, None) => Err(SeedError::InvalidJob(format!(
                "{} jobs need a parent id",
                self.kind.queue_name()
            ))),
            (false, Some(_)) => Err(SeedError::InvalidJob(format!(
                "{} jobs do not take a parent id",
                self.kind.queue_name()
            ))),
            _ => Ok(()),
        }
    }

    /// Parent id of a post/comment job; validated descriptors always carry one
    pub fn require_parent(&self) -> SeedResult<Uuid> {
        self.parent_id.ok_or_else(|| {
            SeedError::InvalidJob(format!("{} job without parent id", self.kind.queue_name()))
        })
    }
}

/// A job taken off its queue and now owned by a worker
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub id: i64,
    pub descriptor: JobDescriptor,
    pub attempt: i64,
}

impl TryFrom<SeedJob> for ClaimedJob {
    type Error = SeedError;

    fn try_from(job: SeedJob) -> SeedResult<Self> {
        let kind = JobKind::parse_queue(&job.queue)
            .ok_or_else(|| SeedError::InvalidJob(format!("unknown queue {}", job.queue)))?;

        Ok(Self {
            id: job.id,
            descriptor: JobDescriptor {
                kind,
                count: job.count,
                parent_id: job.parent_id,
            },
            attempt: job.attempts,
        })
    }
}
