// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Drives one job through the transfer engine.
//!
//! Assembles engine options from the task, resolves the source and
//! destination filesystems, pumps engine stats into job-log rows and bus
//! snapshots while the engine runs, and writes the terminal status plus
//! final counters in a single update.

use crate::bus::{ProgressBus, TransferBus};
use chrono::{DateTime, Utc};
use skiff_adapters::{
    BisyncOptions, CompletedTransfer, CopyOptions, EngineError, StatsGroup, StatsSnapshot,
    TransferEngine, DEFAULT_TRANSFERS,
};
use skiff_core::{
    Classify, Clock, ErrorKind, Job, JobProgress, JobStatus, LogAction, LogLevel, NewJobLog,
    OptionsError, SyncDirection, Task, TransferActivity,
};
use skiff_storage::{ConnectionStore, JobStore, StorageError};
use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Options(#[from] OptionsError),
}

impl Classify for SyncError {
    fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Storage(e) => e.kind(),
            SyncError::Engine(e) => e.kind(),
            SyncError::Options(e) => e.kind(),
        }
    }
}

/// Knobs the daemon wires in from its config file.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// App data dir; bidirectional state lives under `bisync_state/`.
    pub data_dir: PathBuf,
    /// Global parallel-transfer fallback (task option wins, engine default
    /// of 4 applies last).
    pub transfers: Option<u32>,
    /// Delete SUCCESS jobs whose counters are all zero.
    pub auto_delete_empty_jobs: bool,
    /// Stats pump cadence.
    pub poll_interval: Duration,
}

impl SyncConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            transfers: None,
            auto_delete_empty_jobs: false,
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Binds jobs to engine invocations.
pub struct SyncRunner<C: Clock> {
    engine: Arc<dyn TransferEngine>,
    jobs: JobStore,
    connections: ConnectionStore,
    progress: ProgressBus,
    transfers: TransferBus,
    clock: C,
    config: SyncConfig,
}

impl<C: Clock> SyncRunner<C> {
    pub fn new(
        engine: Arc<dyn TransferEngine>,
        jobs: JobStore,
        connections: ConnectionStore,
        progress: ProgressBus,
        transfers: TransferBus,
        clock: C,
        config: SyncConfig,
    ) -> Self {
        Self { engine, jobs, connections, progress, transfers, clock, config }
    }

    /// Edge validation that must pass before any side effect of a start.
    pub fn preflight(&self, task: &Task) -> Result<(), SyncError> {
        task.options.validate()?;
        for rule in &task.options.filters {
            self.engine.validate_filter_rule(rule)?;
        }
        Ok(())
    }

    /// Run `job` to completion and write its terminal state.
    ///
    /// Engine failures are absorbed into the returned terminal status;
    /// an `Err` here means the job could not be driven or finalized at
    /// all and its row may still read RUNNING.
    pub async fn run_task(
        &self,
        cancel: CancellationToken,
        task: &Task,
        job: &Job,
    ) -> Result<JobStatus, SyncError> {
        let connection = self.connections.get(&task.connection_id).await?;
        let rules = task.options.filter_rules().map_err(OptionsError::from)?;
        let transfers =
            task.options.transfers.or(self.config.transfers).unwrap_or(DEFAULT_TRANSFERS);
        let stats = StatsGroup::new();

        let source = task.source_path.to_string_lossy().into_owned();
        let workdir = self.config.data_dir.join("bisync_state").join(task.id.as_str());

        let local = self.engine.resolve_fs("", &source).await?;
        let remote = self.engine.resolve_fs(&connection.name, &task.remote_path).await?;

        let copy_options = CopyOptions {
            filters: rules.clone(),
            transfers,
            delete_extraneous: task.deletes_extraneous(),
        };
        let bisync_options = BisyncOptions {
            filters: rules,
            transfers,
            conflict_resolution: task.options.conflict_resolution,
        };

        let mut engine_run: Pin<Box<dyn Future<Output = Result<(), EngineError>> + Send + '_>> =
            match task.direction {
                SyncDirection::Upload => {
                    self.engine.run_copy(cancel.clone(), &local, &remote, &copy_options, &stats)
                }
                SyncDirection::Download => {
                    self.engine.run_copy(cancel.clone(), &remote, &local, &copy_options, &stats)
                }
                SyncDirection::Bidirectional => self.engine.run_bisync(
                    cancel.clone(),
                    &local,
                    &remote,
                    &workdir,
                    &bisync_options,
                    &stats,
                ),
            };

        let mut pump = PumpState::default();
        let mut poll = tokio::time::interval(self.config.poll_interval);
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        poll.tick().await; // the first tick fires immediately

        let result = loop {
            tokio::select! {
                result = &mut engine_run => break result,
                _ = poll.tick() => {
                    self.pump(task, &connection, job, &stats, &mut pump, JobStatus::Running, None)
                        .await;
                }
            }
        };

        let (status, errors) = match &result {
            Ok(()) => (JobStatus::Success, None),
            Err(EngineError::Cancelled) => (JobStatus::Cancelled, None),
            Err(_) if cancel.is_cancelled() => (JobStatus::Cancelled, None),
            Err(e) => (JobStatus::Failed, Some(e.to_string())),
        };

        let now = self.clock.now_utc();
        // Tail pump: remaining logs plus the terminal snapshot.
        self.pump(task, &connection, job, &stats, &mut pump, status, Some(now)).await;

        let snapshot = stats.snapshot();
        self.jobs.finish_job(&job.id, status, &snapshot.stats, errors.as_deref(), now).await?;

        if status == JobStatus::Success
            && snapshot.stats.is_empty()
            && self.config.auto_delete_empty_jobs
        {
            debug!(job_id = %job.id, "deleting empty successful job");
            if let Err(e) = self.jobs.delete_job(&job.id).await {
                warn!(job_id = %job.id, error = %e, "failed to delete empty job");
            }
        }

        Ok(status)
    }

    /// One poll: persist newly completed transfers, refresh live counters,
    /// publish the two snapshots.
    #[allow(clippy::too_many_arguments)]
    async fn pump(
        &self,
        task: &Task,
        connection: &skiff_storage::ConnectionRecord,
        job: &Job,
        stats: &StatsGroup,
        pump: &mut PumpState,
        status: JobStatus,
        end_time: Option<DateTime<Utc>>,
    ) {
        for completed in stats.drain_completed() {
            let key = (completed.path.clone(), completed.finished_at);
            if pump.seen.insert(key) {
                pump.pending.push(to_job_log(&completed));
            }
        }
        if !pump.pending.is_empty() {
            match self.jobs.add_logs_batch(&job.id, &pump.pending).await {
                Ok(()) => pump.pending.clear(),
                // Keep the batch; the next poll retries it.
                Err(e) => warn!(job_id = %job.id, error = %e, "job log batch failed"),
            }
        }

        let snapshot = stats.snapshot();
        if let Err(e) = self.jobs.update_stats(&job.id, &snapshot.stats).await {
            warn!(job_id = %job.id, error = %e, "failed to persist live stats");
        }

        self.progress.publish(progress_snapshot(task, connection, job, &snapshot, status, end_time));
        self.transfers.publish(TransferActivity {
            job_id: job.id.clone(),
            task_id: task.id.clone(),
            connection_id: connection.id.clone(),
            transfers: stats.in_flight(),
        });
    }
}

#[derive(Default)]
struct PumpState {
    /// (path, finish time) of every logged transfer, for duplicate
    /// suppression across polls.
    seen: HashSet<(String, DateTime<Utc>)>,
    /// Rows not yet accepted by the database.
    pending: Vec<NewJobLog>,
}

fn to_job_log(completed: &CompletedTransfer) -> NewJobLog {
    NewJobLog {
        level: match completed.action {
            LogAction::Error => LogLevel::Error,
            _ => LogLevel::Info,
        },
        time: completed.finished_at,
        path: Some(completed.path.clone()),
        action: completed.action,
        size: completed.size,
    }
}

fn progress_snapshot(
    task: &Task,
    connection: &skiff_storage::ConnectionRecord,
    job: &Job,
    snapshot: &StatsSnapshot,
    status: JobStatus,
    end_time: Option<DateTime<Utc>>,
) -> JobProgress {
    JobProgress {
        job_id: job.id.clone(),
        task_id: task.id.clone(),
        connection_id: connection.id.clone(),
        status,
        files_transferred: snapshot.stats.files_transferred,
        bytes_transferred: snapshot.stats.bytes_transferred,
        files_total: snapshot.files_total,
        bytes_total: snapshot.bytes_total,
        files_deleted: snapshot.stats.files_deleted,
        error_count: snapshot.stats.error_count,
        start_time: job.start_time,
        end_time,
    }
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
