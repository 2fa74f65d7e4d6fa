// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job queries, start/stop, and live subscriptions.

use super::ServiceError;
use skiff_core::{
    Clock, EventFilter, Job, JobId, JobLog, JobProgress, TaskId, TransferActivity, Trigger,
};
use skiff_engine::{ProgressBus, Runner, Subscription, TransferBus, CRASH_REASON};
use skiff_storage::{JobFilter, JobStore, Paging, TaskStore};
use std::sync::Arc;

pub struct JobService<C: Clock> {
    jobs: JobStore,
    tasks: TaskStore,
    runner: Arc<Runner<C>>,
    progress: ProgressBus,
    transfers: TransferBus,
    clock: C,
}

impl<C: Clock> JobService<C> {
    pub fn new(
        jobs: JobStore,
        tasks: TaskStore,
        runner: Arc<Runner<C>>,
        progress: ProgressBus,
        transfers: TransferBus,
        clock: C,
    ) -> Self {
        Self { jobs, tasks, runner, progress, transfers, clock }
    }

    /// Start a job for the task now. Conflict while one is running.
    pub async fn start(&self, task_id: &TaskId, trigger: Trigger) -> Result<Job, ServiceError> {
        let task = self.tasks.get(task_id).await?;
        Ok(self.runner.start_task(task, trigger).await?)
    }

    /// Cancel the running job, if any. `false` when idle (not an error).
    pub fn stop(&self, task_id: &TaskId) -> bool {
        self.runner.stop_task(task_id)
    }

    pub fn is_running(&self, task_id: &TaskId) -> bool {
        self.runner.is_running(task_id)
    }

    pub async fn get(&self, id: &JobId) -> Result<Job, ServiceError> {
        Ok(self.jobs.get(id).await?)
    }

    pub async fn list(&self, filter: &JobFilter, paging: Paging) -> Result<Vec<Job>, ServiceError> {
        Ok(self.jobs.list(filter, paging).await?)
    }

    pub async fn last_for_task(&self, task_id: &TaskId) -> Result<Option<Job>, ServiceError> {
        Ok(self.jobs.last_job_for_task(task_id).await?)
    }

    pub async fn logs(&self, job_id: &JobId) -> Result<Vec<JobLog>, ServiceError> {
        Ok(self.jobs.logs_for_job(job_id).await?)
    }

    /// Best-effort sweep of RUNNING rows, for operational tooling. The
    /// runner performs the same sweep at startup.
    pub async fn reset_stuck_jobs(&self) -> Result<u64, ServiceError> {
        Ok(self.jobs.reset_stuck_jobs(CRASH_REASON, self.clock.now_utc()).await?)
    }

    pub fn subscribe_progress(&self, filter: EventFilter) -> Subscription<JobProgress> {
        self.progress.subscribe(filter)
    }

    pub fn subscribe_transfers(&self, filter: EventFilter) -> Subscription<TransferActivity> {
        self.transfers.subscribe(filter)
    }
}
