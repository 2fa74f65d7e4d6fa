// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The coordinator: at most one live job per task.
//!
//! Every trigger source lands here. A start reserves the task's slot in
//! the active map before the job row exists, so two concurrent starts on
//! one task cannot both win. Shutdown cancels every job context and waits
//! on the tracker, bounded by a grace period; stragglers are failed in the
//! database on the way out.

use crate::bus::ProgressBus;
use crate::sync::{SyncError, SyncRunner};
use async_trait::async_trait;
use parking_lot::Mutex;
use skiff_core::{
    Classify, Clock, ErrorKind, Job, JobId, JobProgress, JobStatus, Task, TaskId, Trigger,
};
use skiff_storage::{JobStore, StorageError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// Fixed reason written by the startup stuck-job sweep.
pub const CRASH_REASON: &str = "System crash or unexpected shutdown";

const PANIC_REASON: &str = "internal error: sync worker panicked";
const SHUTDOWN_REASON: &str = "shutdown grace period elapsed";

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("task already running: {0}")]
    AlreadyRunning(TaskId),
    #[error("runner is shutting down")]
    ShuttingDown,
    #[error(transparent)]
    Rejected(#[from] SyncError),
    #[error("failed to create job: {0}")]
    JobCreate(#[from] StorageError),
}

impl Classify for RunnerError {
    fn kind(&self) -> ErrorKind {
        match self {
            RunnerError::AlreadyRunning(_) | RunnerError::ShuttingDown => ErrorKind::Conflict,
            RunnerError::Rejected(e) => e.kind(),
            RunnerError::JobCreate(e) => e.kind(),
        }
    }
}

struct ActiveJob {
    cancel: CancellationToken,
    job_id: Option<JobId>,
}

type ActiveMap = Arc<Mutex<HashMap<TaskId, ActiveJob>>>;

/// Owns the `task → running job` map and the shutdown wait-group.
pub struct Runner<C: Clock> {
    sync: Arc<SyncRunner<C>>,
    jobs: JobStore,
    progress: ProgressBus,
    clock: C,
    active: ActiveMap,
    tracker: TaskTracker,
    root: CancellationToken,
    stopping: AtomicBool,
    swept: AtomicBool,
    grace: Duration,
}

impl<C: Clock> Runner<C> {
    pub fn new(
        sync: Arc<SyncRunner<C>>,
        jobs: JobStore,
        progress: ProgressBus,
        clock: C,
        grace: Duration,
    ) -> Self {
        Self {
            sync,
            jobs,
            progress,
            clock,
            active: Arc::new(Mutex::new(HashMap::new())),
            tracker: TaskTracker::new(),
            root: CancellationToken::new(),
            stopping: AtomicBool::new(false),
            swept: AtomicBool::new(false),
            grace,
        }
    }

    /// Crash recovery: fail every job the database still thinks is
    /// running. Idempotent and executed once per process; failure is
    /// logged and does not prevent startup.
    pub async fn start(&self) {
        if self.swept.swap(true, Ordering::SeqCst) {
            return;
        }
        match self.jobs.reset_stuck_jobs(CRASH_REASON, self.clock.now_utc()).await {
            Ok(0) => {}
            Ok(swept) => warn!(swept, "failed stuck jobs from a previous run"),
            Err(e) => warn!(error = %e, "stuck-job sweep failed"),
        }
    }

    /// Start one job for `task`. Conflict while a job is active; edge
    /// validation failures reject before any side effect.
    pub async fn start_task(&self, task: Task, trigger: Trigger) -> Result<Job, RunnerError> {
        if self.stopping.load(Ordering::SeqCst) {
            return Err(RunnerError::ShuttingDown);
        }
        self.sync.preflight(&task)?;

        // Reserve the slot first; job creation and map insert must be
        // atomic with respect to other starts on this task.
        let cancel = self.root.child_token();
        {
            let mut active = self.active.lock();
            if active.contains_key(&task.id) {
                return Err(RunnerError::AlreadyRunning(task.id.clone()));
            }
            active.insert(task.id.clone(), ActiveJob { cancel: cancel.clone(), job_id: None });
        }

        let job = match self.jobs.create_job(&task.id, trigger, self.clock.now_utc()).await {
            Ok(job) => job,
            Err(e) => {
                self.active.lock().remove(&task.id);
                return Err(e.into());
            }
        };
        if let Some(entry) = self.active.lock().get_mut(&task.id) {
            entry.job_id = Some(job.id.clone());
        }
        info!(task_id = %task.id, job_id = %job.id, %trigger, "job started");

        let worker = Worker {
            sync: Arc::clone(&self.sync),
            jobs: self.jobs.clone(),
            progress: self.progress.clone(),
            clock: self.clock.clone(),
            active: Arc::clone(&self.active),
        };
        self.tracker.spawn(worker.run(task, job.clone(), cancel));
        Ok(job)
    }

    /// Cancel the active job for a task. Returns false when nothing was
    /// running, which is not an error.
    pub fn stop_task(&self, task_id: &TaskId) -> bool {
        let active = self.active.lock();
        match active.get(task_id) {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, task_id: &TaskId) -> bool {
        self.active.lock().contains_key(task_id)
    }

    /// Reject new starts, cancel every job context, then wait for
    /// outstanding work, bounded by the grace period. Jobs still running
    /// after the grace are failed in the database.
    pub async fn stop(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        self.root.cancel();
        self.tracker.close();
        if tokio::time::timeout(self.grace, self.tracker.wait()).await.is_ok() {
            return;
        }
        warn!("shutdown grace elapsed with jobs still running");
        let leftover: Vec<(TaskId, JobId)> = {
            let mut active = self.active.lock();
            active
                .drain()
                .filter_map(|(task_id, entry)| entry.job_id.map(|job_id| (task_id, job_id)))
                .collect()
        };
        let now = self.clock.now_utc();
        for (task_id, job_id) in leftover {
            warn!(%task_id, %job_id, "failing job stuck in shutdown");
            if let Err(e) = self
                .jobs
                .update_status(&job_id, JobStatus::Failed, Some(SHUTDOWN_REASON), now)
                .await
            {
                warn!(%job_id, error = %e, "failed to mark stuck job FAILED");
            }
        }
    }
}

/// The per-job worker: everything it needs, cloned out of the runner so
/// the spawned future is self-contained.
struct Worker<C: Clock> {
    sync: Arc<SyncRunner<C>>,
    jobs: JobStore,
    progress: ProgressBus,
    clock: C,
    active: ActiveMap,
}

impl<C: Clock> Worker<C> {
    async fn run(self, task: Task, job: Job, cancel: CancellationToken) {
        // The sync run gets its own task so a panic inside it is contained
        // and surfaces here as a JoinError.
        let run = tokio::spawn({
            let sync = Arc::clone(&self.sync);
            let (task, job) = (task.clone(), job.clone());
            async move { sync.run_task(cancel, &task, &job).await }
        });

        match run.await {
            Ok(Ok(status)) => {
                debug!(task_id = %task.id, job_id = %job.id, %status, "job finished");
            }
            Ok(Err(e)) => {
                warn!(task_id = %task.id, job_id = %job.id, error = %e, "job run failed");
                self.fail_job(&task, &job, &e.to_string()).await;
            }
            Err(join) if join.is_panic() => {
                error!(task_id = %task.id, job_id = %job.id, "sync worker panicked");
                self.fail_job(&task, &job, PANIC_REASON).await;
            }
            Err(_) => {
                debug!(task_id = %task.id, job_id = %job.id, "sync worker aborted");
            }
        }

        self.active.lock().remove(&task.id);
    }

    /// Write FAILED for a job whose run could not finalize itself, and
    /// publish the terminal snapshot. A lattice conflict means the run
    /// already finalized; nothing to do then.
    async fn fail_job(&self, task: &Task, job: &Job, reason: &str) {
        let now = self.clock.now_utc();
        match self.jobs.update_status(&job.id, JobStatus::Failed, Some(reason), now).await {
            Ok(_) => self.progress.publish(JobProgress {
                job_id: job.id.clone(),
                task_id: task.id.clone(),
                connection_id: task.connection_id.clone(),
                status: JobStatus::Failed,
                files_transferred: 0,
                bytes_transferred: 0,
                files_total: 0,
                bytes_total: 0,
                files_deleted: 0,
                error_count: 0,
                start_time: job.start_time,
                end_time: Some(now),
            }),
            Err(StorageError::Conflict(_)) => {}
            Err(e) => warn!(job_id = %job.id, error = %e, "failed to mark job FAILED"),
        }
    }
}

/// Where triggers land. The scheduler and watcher speak to the runner
/// through this seam so tests can record trigger streams.
#[async_trait]
pub trait TriggerSink: Send + Sync + 'static {
    /// Fire-and-forget: conflicts (task already running, shutdown in
    /// progress) drop the trigger silently.
    async fn trigger(&self, task: Task, trigger: Trigger);
}

#[async_trait]
impl<C: Clock> TriggerSink for Runner<C> {
    async fn trigger(&self, task: Task, trigger: Trigger) {
        let task_id = task.id.clone();
        match self.start_task(task, trigger).await {
            Ok(_) => {}
            Err(RunnerError::AlreadyRunning(_)) => {
                debug!(%task_id, %trigger, "trigger dropped: task already running");
            }
            Err(RunnerError::ShuttingDown) => {
                debug!(%task_id, %trigger, "trigger dropped: shutting down");
            }
            Err(e) => warn!(%task_id, %trigger, error = %e, "trigger failed"),
        }
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
