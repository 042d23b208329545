use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use echo_server::db::repositories::{CommentRepository, PostRepository, UserRepository};
use echo_server::db::Database;
use echo_server::progress::COUNT_UPDATE_TOPIC;
use echo_server::seeding::{
    EntityStore, SeedError, SeedResult, SeedWorker, SqliteEntityStore, StaticSampleSource,
    WorkerContext,
};
use echo_server::state::AppState;
use echo_types::{
    Comment, EntityKind, JobKind, JobStatus, NewComment, NewPost, NewUser, Post, User,
};

struct Pipeline {
    state: AppState,
    workers: Vec<SeedWorker>,
}

impl Pipeline {
    fn new(max_attempts: i64) -> Result<Self> {
        let db = Database::in_memory()?;
        db.initialize()?;
        let state = AppState::new(db, max_attempts, Duration::from_millis(25));
        let ctx = state.worker_context(
            Arc::new(StaticSampleSource::builtin()?),
            Duration::from_secs(60),
        );
        Ok(Self::with_context(state, ctx))
    }

    fn with_context(state: AppState, ctx: WorkerContext) -> Self {
        let workers = JobKind::ALL
            .iter()
            .map(|kind| SeedWorker::new(*kind, ctx.clone()))
            .collect();
        Self { state, workers }
    }

    /// Run every queue dry, one job at a time, users first
    async fn drain(&self) -> Result<usize> {
        let mut handled = 0;
        loop {
            let mut progressed = false;
            for worker in &self.workers {
                if worker.process_next().await?.is_some() {
                    handled += 1;
                    progressed = true;
                }
            }
            if !progressed {
                return Ok(handled);
            }
        }
    }

    fn users(&self) -> UserRepository {
        UserRepository::new(self.state.db.pool.clone())
    }

    fn posts(&self) -> PostRepository {
        PostRepository::new(self.state.db.pool.clone())
    }

    fn comments(&self) -> CommentRepository {
        CommentRepository::new(self.state.db.pool.clone())
    }

    fn completed(&self, kind: JobKind) -> Result<usize> {
        Ok(self.state.queue.jobs(kind, JobStatus::Completed)?.len())
    }
}

#[tokio::test]
async fn test_three_users_cascade_end_to_end() -> Result<()> {
    let pipeline = Pipeline::new(1)?;

    pipeline.state.dispatcher.seed_users(3).await?;
    let handled = pipeline.drain().await?;

    // 1 user job + 3 post jobs + 30 comment jobs
    assert_eq!(handled, 34);
    assert_eq!(pipeline.completed(JobKind::UserSeed)?, 1);
    assert_eq!(pipeline.completed(JobKind::PostSeed)?, 3);
    assert_eq!(pipeline.completed(JobKind::CommentSeed)?, 30);

    let users = pipeline.users().list(1)?;
    let indices: Vec<i64> = users.iter().map(|u| u.seed_index).collect();
    assert_eq!(indices, vec![1, 2, 3]);
    assert_eq!(users[0].username, "Bret_1");
    assert_eq!(users[2].username, "Samantha_3");

    assert_eq!(pipeline.posts().count()?, 30);
    assert_eq!(pipeline.comments().count()?, 300);

    for user in &users {
        let posts = pipeline.posts().get_by_user(&user.id)?;
        assert_eq!(posts.len(), 10);
        for post in &posts {
            assert_eq!(pipeline.comments().count_by_post(&post.id)?, 10);
        }
    }

    let stats = pipeline.state.queue.stats()?;
    assert!(stats.iter().all(|s| s.pending == 0 && s.running == 0 && s.failed == 0));
    Ok(())
}

#[tokio::test]
async fn test_single_user_fans_out_to_one_hundred_comments() -> Result<()> {
    let pipeline = Pipeline::new(1)?;

    pipeline.state.dispatcher.seed_users(1).await?;
    pipeline.drain().await?;

    let users = pipeline.users().list(1)?;
    assert_eq!(users.len(), 1);

    let posts = pipeline.posts().get_by_user(&users[0].id)?;
    assert_eq!(posts.len(), 10);
    assert!(posts.iter().all(|p| p.user_id == users[0].id));

    let post_indices: Vec<i64> = posts.iter().map(|p| p.seed_index).collect();
    assert_eq!(post_indices, (1..=10).collect::<Vec<_>>());

    let mut comment_total = 0;
    for post in &posts {
        let first_page = pipeline.comments().list_by_post(&post.id, 1)?;
        assert_eq!(first_page.len(), 10);
        assert!(first_page.iter().all(|c| c.post_id == post.id));
        comment_total += first_page.len();
    }
    assert_eq!(comment_total, 100);
    Ok(())
}

#[tokio::test]
async fn test_progress_reports_running_user_total() -> Result<()> {
    let pipeline = Pipeline::new(1)?;
    let mut updates = pipeline.state.hub.subscribe(COUNT_UPDATE_TOPIC).await;

    pipeline.state.dispatcher.seed_users(3).await?;
    pipeline.drain().await?;

    for expected in 1..=3 {
        let update = updates.recv().await?;
        assert_eq!(update["type"], COUNT_UPDATE_TOPIC);
        assert_eq!(update["total"], expected);
    }
    Ok(())
}

/// Delegates to SQLite but refuses the n-th user
struct RefusingStore {
    inner: SqliteEntityStore,
    refuse_at: usize,
    user_calls: AtomicUsize,
}

#[async_trait]
impl EntityStore for RefusingStore {
    async fn create_user(&self, user: &NewUser) -> SeedResult<User> {
        let call = self.user_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.refuse_at {
            return Err(SeedError::Persistence {
                entity: EntityKind::User,
                message: format!("refused user {}", user.seed_index),
            });
        }
        self.inner.create_user(user).await
    }

    async fn create_post(&self, post: &NewPost) -> SeedResult<Post> {
        self.inner.create_post(post).await
    }

    async fn create_comment(&self, comment: &NewComment) -> SeedResult<Comment> {
        self.inner.create_comment(comment).await
    }

    async fn count_users(&self) -> SeedResult<i64> {
        self.inner.count_users().await
    }
}

#[tokio::test]
async fn test_persistence_failure_stops_the_batch() -> Result<()> {
    let db = Database::in_memory()?;
    db.initialize()?;
    let state = AppState::new(db.clone(), 1, Duration::from_millis(25));
    let mut ctx = state.worker_context(
        Arc::new(StaticSampleSource::builtin()?),
        Duration::from_secs(60),
    );
    let refusing = Arc::new(RefusingStore {
        inner: SqliteEntityStore::new(db.pool.clone()),
        refuse_at: 5,
        user_calls: AtomicUsize::new(0),
    });
    ctx.store = refusing.clone() as Arc<dyn EntityStore>;
    let user_worker = SeedWorker::new(JobKind::UserSeed, ctx);

    let job_id = state.dispatcher.seed_users(10).await?;
    let report = user_worker
        .process_next()
        .await?
        .expect("The user job should be pending");

    assert_eq!(report.job_id, job_id);
    assert_eq!(report.status, JobStatus::Failed);
    assert!(matches!(report.error, Some(SeedError::Persistence { .. })));

    // Users 1-4 are committed and cascaded, 6-10 were never attempted
    let users = UserRepository::new(db.pool.clone()).list(1)?;
    let indices: Vec<i64> = users.iter().map(|u| u.seed_index).collect();
    assert_eq!(indices, vec![1, 2, 3, 4]);
    assert_eq!(refusing.user_calls.load(Ordering::SeqCst), 5);

    let post_jobs = state.queue.jobs(JobKind::PostSeed, JobStatus::Pending)?;
    assert_eq!(post_jobs.len(), 4);
    let parents: Vec<_> = post_jobs.iter().filter_map(|j| j.parent_id).collect();
    let user_ids: Vec<_> = users.iter().map(|u| u.id).collect();
    assert_eq!(parents, user_ids);

    let failed = state.queue.failed_jobs(10)?;
    assert_eq!(failed.len(), 1);
    assert!(failed[0]
        .last_error
        .as_deref()
        .is_some_and(|e| e.contains("refused user 5")));
    Ok(())
}

#[tokio::test]
async fn test_failed_job_is_retried_up_to_max_attempts() -> Result<()> {
    let db = Database::in_memory()?;
    db.initialize()?;
    let state = AppState::new(db, 2, Duration::from_millis(25));
    let ctx = state.worker_context(
        Arc::new(StaticSampleSource::builtin()?.failing()),
        Duration::from_secs(60),
    );
    let worker = SeedWorker::new(JobKind::UserSeed, ctx);

    state.dispatcher.seed_users(5).await?;

    let first = worker.process_next().await?.expect("Job should be pending");
    assert_eq!(first.status, JobStatus::Pending);

    let second = worker.process_next().await?.expect("Job should be retried");
    assert_eq!(second.status, JobStatus::Failed);

    assert!(worker.process_next().await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_workers_run_concurrently_until_shutdown() -> Result<()> {
    let pipeline = Pipeline::new(1)?;
    let shutdown = CancellationToken::new();

    let Pipeline { state, workers } = pipeline;
    let handles: Vec<_> = workers
        .into_iter()
        .map(|worker| tokio::spawn(worker.run(shutdown.clone())))
        .collect();

    state.dispatcher.seed_users(2).await?;

    let comments = CommentRepository::new(state.db.pool.clone());
    tokio::time::timeout(Duration::from_secs(30), async {
        while comments.count().unwrap_or(0) < 200 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await?;

    shutdown.cancel();
    for handle in handles {
        tokio::time::timeout(Duration::from_secs(5), handle).await??;
    }

    assert_eq!(UserRepository::new(state.db.pool.clone()).count()?, 2);
    assert_eq!(PostRepository::new(state.db.pool.clone()).count()?, 20);
    assert_eq!(comments.count()?, 200);
    Ok(())
}
