//! Cascading seed pipeline: queues, record synthesis and the workers tying them together.

pub mod counter;
pub mod dispatcher;
pub mod error;
pub mod factory;
pub mod job;
pub mod queue;
pub mod scheduler;
pub mod source;
pub mod store;
pub mod worker;

pub use counter::{SqliteCounter, UniquenessCounter};
pub use dispatcher::SeedDispatcher;
pub use error::{SeedError, SeedResult};
pub use factory::RecordFactory;
pub use job::{ClaimedJob, JobDescriptor, COMMENTS_PER_POST, MAX_SEED_COUNT, PAGE_SIZE, POSTS_PER_USER};
pub use queue::{JobQueue, SqliteJobQueue};
pub use source::{HttpSampleSource, SampleSource, StaticSampleSource};
pub use store::{EntityStore, SqliteEntityStore};
pub use worker::{JobReport, SeedWorker, WorkerContext};
