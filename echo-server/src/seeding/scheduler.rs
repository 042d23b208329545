use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::dispatcher::SeedDispatcher;

/// Periodically enqueues a user seed job until `shutdown` fires.
///
/// The first run happens one full interval after start.
pub async fn run_schedule(
    dispatcher: SeedDispatcher,
    every: Duration,
    count: i64,
    shutdown: CancellationToken,
) {
    info!(interval_secs = every.as_secs(), count, "Seed scheduler started");

    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {}
        }

        debug!("Running scheduled user seed...");
        match dispatcher.seed_users(count).await {
            Ok(job_id) => info!(job_id, count, "Scheduled user seed enqueued"),
            Err(e) => error!(error = %e, "Scheduled user seed failed"),
        }
    }

    info!("Seed scheduler stopped");
}
