use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::OptionalExtension;
use uuid::Uuid;

use echo_types::{JobKind, JobStatus, QueueStats, SeedJob};

use super::{optional_uuid_column, timestamp_column};
use crate::db::DbPool;

const JOB_COLUMNS: &str =
    "id, queue, count, parent_id, status, attempts, max_attempts, last_error, created_at, updated_at";

/// Storage for the durable seed queues
pub struct JobRepository {
    pool: DbPool,
}

impl JobRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SeedJob> {
        let status: String = row.get(4)?;
        Ok(SeedJob {
            id: row.get(0)?,
            queue: row.get(1)?,
            count: row.get(2)?,
            parent_id: optional_uuid_column(row, 3)?,
            status: JobStatus::parse(&status)
                .ok_or_else(|| rusqlite::Error::InvalidColumnType(4, status.clone(), Type::Text))?,
            attempts: row.get(5)?,
            max_attempts: row.get(6)?,
            last_error: row.get(7)?,
            created_at: timestamp_column(row, 8)?,
            updated_at: timestamp_column(row, 9)?,
        })
    }

    /// Append a pending job to the tail of a queue
    pub fn insert(
        &self,
        kind: JobKind,
        count: i64,
        parent_id: Option<Uuid>,
        max_attempts: i64,
    ) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO seed_jobs (queue, count, parent_id, status, attempts, max_attempts, created_at, updated_at)
             VALUES (?, ?, ?, 'pending', 0, ?, ?, ?)",
            (
                kind.queue_name(),
                count,
                parent_id.map(|id| id.to_string()),
                max_attempts,
                &now,
                &now,
            ),
        )
        .with_context(|| format!("Failed to enqueue job on {}", kind.queue_name()))?;

        Ok(conn.last_insert_rowid())
    }

    /// Move the oldest pending job of a queue to running and return it
    pub fn claim_next(&self, kind: JobKind) -> Result<Option<SeedJob>> {
        let conn = self.pool.get()?;
        let job = conn
            .query_row(
                &format!(
                    "UPDATE seed_jobs
                     SET status = 'running', attempts = attempts + 1, updated_at = ?2
                     WHERE id = (
                         SELECT id FROM seed_jobs
                         WHERE queue = ?1 AND status = 'pending'
                         ORDER BY id ASC
                         LIMIT 1
                     )
                     RETURNING {}",
                    JOB_COLUMNS
                ),
                (kind.queue_name(), Utc::now().to_rfc3339()),
                Self::map_row,
            )
            .optional()
            .with_context(|| format!("Failed to claim job from {}", kind.queue_name()))?;

        Ok(job)
    }

    pub fn mark_completed(&self, job_id: i64) -> Result<()> {
        let conn = self.pool.get()?;
        let updated = conn
            .execute(
                "UPDATE seed_jobs SET status = 'completed', last_error = NULL, updated_at = ?
                 WHERE id = ? AND status = 'running'",
                (Utc::now().to_rfc3339(), job_id),
            )
            .context("Failed to mark job completed")?;

        if updated == 0 {
            return Err(anyhow!("Job {} is not running", job_id));
        }
        Ok(())
    }

    /// Record a failed attempt; the job goes back to pending while attempts
    /// remain, otherwise it becomes failed. Returns the resulting status.
    pub fn mark_failed(&self, job_id: i64, error: &str) -> Result<JobStatus> {
        let conn = self.pool.get()?;
        let status: Option<String> = conn
            .query_row(
                "UPDATE seed_jobs
                 SET status = CASE WHEN attempts < max_attempts THEN 'pending' ELSE 'failed' END,
                     last_error = ?2,
                     updated_at = ?3
                 WHERE id = ?1 AND status = 'running'
                 RETURNING status",
                (job_id, error, Utc::now().to_rfc3339()),
                |row| row.get(0),
            )
            .optional()
            .context("Failed to mark job failed")?;

        let status = status.ok_or_else(|| anyhow!("Job {} is not running", job_id))?;
        JobStatus::parse(&status).ok_or_else(|| anyhow!("Unknown job status {}", status))
    }

    /// Return jobs left running by a previous process to their queues
    pub fn requeue_stalled(&self) -> Result<usize> {
        let conn = self.pool.get()?;
        let count = conn
            .execute(
                "UPDATE seed_jobs SET status = 'pending', updated_at = ? WHERE status = 'running'",
                [Utc::now().to_rfc3339()],
            )
            .context("Failed to requeue stalled jobs")?;
        Ok(count)
    }

    /// Put every failed job of a queue back to pending with a fresh attempt budget
    pub fn retry_failed(&self, kind: JobKind) -> Result<usize> {
        let conn = self.pool.get()?;
        let count = conn
            .execute(
                "UPDATE seed_jobs SET status = 'pending', attempts = 0, updated_at = ?
                 WHERE queue = ? AND status = 'failed'",
                (Utc::now().to_rfc3339(), kind.queue_name()),
            )
            .context("Failed to retry failed jobs")?;
        Ok(count)
    }

    pub fn get(&self, job_id: i64) -> Result<Option<SeedJob>> {
        let conn = self.pool.get()?;
        let job = conn
            .query_row(
                &format!("SELECT {} FROM seed_jobs WHERE id = ?", JOB_COLUMNS),
                [job_id],
                Self::map_row,
            )
            .optional()?;
        Ok(job)
    }

    /// Jobs of a queue in a given status, in queue order
    pub fn list(&self, kind: JobKind, status: JobStatus) -> Result<Vec<SeedJob>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM seed_jobs WHERE queue = ? AND status = ? ORDER BY id ASC",
            JOB_COLUMNS
        ))?;

        let jobs = stmt
            .query_map((kind.queue_name(), status.as_str()), Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(jobs)
    }

    /// Most recently failed jobs across all queues
    pub fn recent_failures(&self, limit: i64) -> Result<Vec<SeedJob>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM seed_jobs WHERE status = 'failed' ORDER BY updated_at DESC, id DESC LIMIT ?",
            JOB_COLUMNS
        ))?;

        let jobs = stmt
            .query_map([limit], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(jobs)
    }

    pub fn stats(&self, kind: JobKind) -> Result<QueueStats> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT status, COUNT(*) FROM seed_jobs WHERE queue = ? GROUP BY status",
        )?;

        let mut stats = QueueStats {
            queue: kind.queue_name().to_string(),
            ..Default::default()
        };

        let rows = stmt.query_map([kind.queue_name()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (status, count) = row?;
            match JobStatus::parse(&status) {
                Some(JobStatus::Pending) => stats.pending = count,
                Some(JobStatus::Running) => stats.running = count,
                Some(JobStatus::Completed) => stats.completed = count,
                Some(JobStatus::Failed) => stats.failed = count,
                None => tracing::warn!("Ignoring unknown job status {}", status),
            }
        }

        Ok(stats)
    }
}
