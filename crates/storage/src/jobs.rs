// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job and job-log rows.
//!
//! All status writes go through this store, which refuses to regress
//! through the lattice {PENDING, RUNNING} < {SUCCESS, FAILED, CANCELLED}
//! and stamps `end_time` on every terminal write.

use crate::db::Db;
use crate::error::StorageError;
use chrono::{DateTime, Utc};
use skiff_core::{
    ConnectionId, Job, JobId, JobLog, JobStats, JobStatus, LogAction, LogLevel, NewJobLog, TaskId,
    Trigger,
};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row};

/// Optional selection for [`JobStore::list`].
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub task_id: Option<TaskId>,
    pub status: Option<JobStatus>,
}

#[derive(Debug, Clone, Copy)]
pub struct Paging {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Paging {
    fn default() -> Self {
        Self { limit: 50, offset: 0 }
    }
}

#[derive(Clone)]
pub struct JobStore {
    db: Db,
}

impl JobStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Insert a RUNNING job row for a fresh trigger.
    pub async fn create_job(
        &self,
        task_id: &TaskId,
        trigger: Trigger,
        now: DateTime<Utc>,
    ) -> Result<Job, StorageError> {
        let job = Job {
            id: JobId::new(),
            task_id: task_id.clone(),
            status: JobStatus::Running,
            trigger,
            start_time: now,
            end_time: None,
            stats: JobStats::default(),
            errors: None,
        };
        sqlx::query(
            "INSERT INTO jobs (id, task_id, status, \"trigger\", start_time) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(job.id.as_str())
        .bind(job.task_id.as_str())
        .bind(job.status.as_str())
        .bind(job.trigger.as_str())
        .bind(job.start_time)
        .execute(self.db.pool())
        .await?;
        Ok(job)
    }

    pub async fn get(&self, id: &JobId) -> Result<Job, StorageError> {
        self.get_optional(id)
            .await?
            .ok_or_else(|| StorageError::not_found("job", id.as_str()))
    }

    pub async fn get_optional(&self, id: &JobId) -> Result<Option<Job>, StorageError> {
        sqlx::query("SELECT * FROM jobs WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(self.db.pool())
            .await?
            .map(|row| job_from_row(&row))
            .transpose()
    }

    /// Move a job through the status lattice. Terminal targets stamp
    /// `end_time`; regressions are rejected with Conflict. The guard is
    /// rendered from [`JobStatus::predecessors`], so the SQL cannot
    /// diverge from the domain lattice.
    pub async fn update_status(
        &self,
        id: &JobId,
        to: JobStatus,
        errors: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Job, StorageError> {
        let guard = lattice_guard(to);
        if guard.is_empty() {
            // No status may move to `to` (e.g. back to PENDING).
            return self.refused(id, to).await;
        }
        let done = if to.is_terminal() {
            let sql = format!(
                "UPDATE jobs SET status = ?2, errors = COALESCE(?3, errors), end_time = ?4 \
                 WHERE id = ?1 AND status IN ({guard})"
            );
            sqlx::query(&sql)
                .bind(id.as_str())
                .bind(to.as_str())
                .bind(errors)
                .bind(now)
                .execute(self.db.pool())
                .await?
        } else {
            let sql =
                format!("UPDATE jobs SET status = ?2 WHERE id = ?1 AND status IN ({guard})");
            sqlx::query(&sql)
                .bind(id.as_str())
                .bind(to.as_str())
                .execute(self.db.pool())
                .await?
        };
        if done.rows_affected() == 0 {
            return self.refused(id, to).await;
        }
        self.get(id).await
    }

    /// NotFound/Conflict discrimination for a status write that matched
    /// no row.
    async fn refused(&self, id: &JobId, to: JobStatus) -> Result<Job, StorageError> {
        match self.get_optional(id).await? {
            Some(job) => Err(StorageError::Conflict(format!(
                "job {} cannot move {} -> {}",
                id.short(8),
                job.status,
                to
            ))),
            None => Err(StorageError::not_found("job", id.as_str())),
        }
    }

    /// Live counter update while the job runs.
    pub async fn update_stats(&self, id: &JobId, stats: &JobStats) -> Result<(), StorageError> {
        sqlx::query(
            "UPDATE jobs SET files_transferred = ?2, bytes_transferred = ?3, \
             files_deleted = ?4, error_count = ?5 WHERE id = ?1",
        )
        .bind(id.as_str())
        .bind(stats.files_transferred as i64)
        .bind(stats.bytes_transferred as i64)
        .bind(stats.files_deleted as i64)
        .bind(stats.error_count as i64)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    /// Terminal status plus final counters in a single update, guarded by
    /// the same lattice predicate as [`JobStore::update_status`].
    pub async fn finish_job(
        &self,
        id: &JobId,
        to: JobStatus,
        stats: &JobStats,
        errors: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Job, StorageError> {
        debug_assert!(to.is_terminal());
        let sql = format!(
            "UPDATE jobs SET status = ?2, errors = ?3, end_time = ?4, \
             files_transferred = ?5, bytes_transferred = ?6, files_deleted = ?7, error_count = ?8 \
             WHERE id = ?1 AND status IN ({})",
            lattice_guard(to)
        );
        let done = sqlx::query(&sql)
            .bind(id.as_str())
            .bind(to.as_str())
            .bind(errors)
            .bind(now)
            .bind(stats.files_transferred as i64)
            .bind(stats.bytes_transferred as i64)
            .bind(stats.files_deleted as i64)
            .bind(stats.error_count as i64)
            .execute(self.db.pool())
            .await?;
        if done.rows_affected() == 0 {
            return self.refused(id, to).await;
        }
        self.get(id).await
    }

    pub async fn last_job_for_task(&self, task_id: &TaskId) -> Result<Option<Job>, StorageError> {
        sqlx::query("SELECT * FROM jobs WHERE task_id = ?1 ORDER BY start_time DESC LIMIT 1")
            .bind(task_id.as_str())
            .fetch_optional(self.db.pool())
            .await?
            .map(|row| job_from_row(&row))
            .transpose()
    }

    pub async fn list(&self, filter: &JobFilter, paging: Paging) -> Result<Vec<Job>, StorageError> {
        let rows = sqlx::query(
            "SELECT * FROM jobs \
             WHERE (?1 IS NULL OR task_id = ?1) AND (?2 IS NULL OR status = ?2) \
             ORDER BY start_time DESC LIMIT ?3 OFFSET ?4",
        )
        .bind(filter.task_id.as_ref().map(|t| t.as_str().to_string()))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(paging.limit)
        .bind(paging.offset)
        .fetch_all(self.db.pool())
        .await?;
        rows.iter().map(job_from_row).collect()
    }

    /// Delete a job row (and, via cascade, its logs).
    pub async fn delete_job(&self, id: &JobId) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM jobs WHERE id = ?1")
            .bind(id.as_str())
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    /// Crash recovery: every RUNNING job becomes FAILED in one statement.
    /// Returns how many rows were swept.
    pub async fn reset_stuck_jobs(
        &self,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, StorageError> {
        let done = sqlx::query(
            "UPDATE jobs SET status = 'FAILED', errors = ?1, end_time = ?2 \
             WHERE status = 'RUNNING'",
        )
        .bind(reason)
        .bind(now)
        .execute(self.db.pool())
        .await?;
        Ok(done.rows_affected())
    }

    /// Batch-insert per-file logs for a job in one statement.
    pub async fn add_logs_batch(
        &self,
        job_id: &JobId,
        logs: &[NewJobLog],
    ) -> Result<(), StorageError> {
        if logs.is_empty() {
            return Ok(());
        }
        let mut builder: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new("INSERT INTO job_logs (job_id, level, time, path, action, size) ");
        builder.push_values(logs, |mut b, log| {
            b.push_bind(job_id.as_str())
                .push_bind(log.level.as_str())
                .push_bind(log.time)
                .push_bind(log.path.as_deref())
                .push_bind(log.action.as_str())
                .push_bind(log.size.map(|s| s as i64));
        });
        builder.build().execute(self.db.pool()).await?;
        Ok(())
    }

    /// Logs for one job, in time order.
    pub async fn logs_for_job(&self, job_id: &JobId) -> Result<Vec<JobLog>, StorageError> {
        let rows = sqlx::query("SELECT * FROM job_logs WHERE job_id = ?1 ORDER BY time, id")
            .bind(job_id.as_str())
            .fetch_all(self.db.pool())
            .await?;
        rows.iter().map(log_from_row).collect()
    }

    /// Keep the newest `keep` logs across all of a connection's jobs and
    /// delete the rest, in a single statement.
    pub async fn trim_connection_logs(
        &self,
        connection_id: &ConnectionId,
        keep: u32,
    ) -> Result<u64, StorageError> {
        let done = sqlx::query(
            "DELETE FROM job_logs WHERE id IN ( \
               SELECT jl.id FROM job_logs jl \
               JOIN jobs j ON jl.job_id = j.id \
               JOIN tasks t ON j.task_id = t.id \
               WHERE t.connection_id = ?1 \
               ORDER BY jl.time DESC, jl.id DESC LIMIT -1 OFFSET ?2)",
        )
        .bind(connection_id.as_str())
        .bind(keep as i64)
        .execute(self.db.pool())
        .await?;
        Ok(done.rows_affected())
    }
}

/// SQL IN-list of the statuses allowed to move to `to`, rendered from the
/// domain lattice. Every value comes from [`JobStatus::as_str`], never
/// from caller input. Empty when nothing may move to `to`.
fn lattice_guard(to: JobStatus) -> String {
    JobStatus::predecessors(to)
        .map(|from| format!("'{}'", from.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn job_from_row(row: &SqliteRow) -> Result<Job, StorageError> {
    let status: String = row.try_get("status")?;
    let trigger: String = row.try_get("trigger")?;
    Ok(Job {
        id: JobId::from(row.try_get::<String, _>("id")?),
        task_id: TaskId::from(row.try_get::<String, _>("task_id")?),
        status: status.parse::<JobStatus>()?,
        trigger: trigger.parse::<Trigger>()?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        stats: JobStats {
            files_transferred: row.try_get::<i64, _>("files_transferred")?.max(0) as u64,
            bytes_transferred: row.try_get::<i64, _>("bytes_transferred")?.max(0) as u64,
            files_deleted: row.try_get::<i64, _>("files_deleted")?.max(0) as u64,
            error_count: row.try_get::<i64, _>("error_count")?.max(0) as u64,
        },
        errors: row.try_get("errors")?,
    })
}

fn log_from_row(row: &SqliteRow) -> Result<JobLog, StorageError> {
    let level: String = row.try_get("level")?;
    let action: String = row.try_get("action")?;
    Ok(JobLog {
        id: row.try_get("id")?,
        job_id: JobId::from(row.try_get::<String, _>("job_id")?),
        level: level.parse::<LogLevel>()?,
        time: row.try_get("time")?,
        path: row.try_get("path")?,
        action: action.parse::<LogAction>()?,
        size: row.try_get::<Option<i64>, _>("size")?.map(|s| s.max(0) as u64),
    })
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;
