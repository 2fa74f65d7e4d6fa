// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cron-driven trigger source.
//!
//! One entry per task; each entry is a tokio loop sleeping until the next
//! schedule instant and handing the (re-fetched) task to the trigger sink.
//! Overlap never happens here; the runner's single-flight map drops
//! conflicting ticks.

use crate::runner::TriggerSink;
use chrono::Utc;
use cron::Schedule;
use parking_lot::Mutex;
use skiff_core::{Classify, ErrorKind, Task, TaskId, Trigger};
use skiff_storage::{StorageError, TaskStore};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid cron expression {expr:?}: {source}")]
    InvalidSchedule {
        expr: String,
        #[source]
        source: cron::error::Error,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl Classify for SchedulerError {
    fn kind(&self) -> ErrorKind {
        match self {
            SchedulerError::InvalidSchedule { .. } => ErrorKind::Validation,
            SchedulerError::Storage(e) => e.kind(),
        }
    }
}

struct Entry {
    expr: String,
    handle: AbortHandle,
}

pub struct Scheduler {
    sink: Arc<dyn TriggerSink>,
    tasks: TaskStore,
    entries: Mutex<HashMap<TaskId, Entry>>,
}

impl Scheduler {
    pub fn new(sink: Arc<dyn TriggerSink>, tasks: TaskStore) -> Self {
        Self { sink, tasks, entries: Mutex::new(HashMap::new()) }
    }

    /// Enroll every task with a non-empty schedule. Tasks whose stored
    /// expression no longer parses are skipped with a warning.
    pub async fn start(&self) -> Result<(), SchedulerError> {
        let scheduled = self.tasks.list_scheduled().await?;
        let count = scheduled.len();
        for task in scheduled {
            if let Err(e) = self.add_task(&task) {
                warn!(task_id = %task.id, error = %e, "skipping task with bad schedule");
            }
        }
        info!(count, "scheduler started");
        Ok(())
    }

    /// Enroll or re-enroll a task. An empty schedule removes any entry;
    /// a parse failure leaves existing state untouched.
    pub fn add_task(&self, task: &Task) -> Result<(), SchedulerError> {
        if task.schedule.is_empty() {
            self.remove_task(&task.id);
            return Ok(());
        }
        let schedule =
            Schedule::from_str(&task.schedule).map_err(|source| SchedulerError::InvalidSchedule {
                expr: task.schedule.clone(),
                source,
            })?;

        let handle = self.spawn_entry(task.id.clone(), schedule);
        let mut entries = self.entries.lock();
        if let Some(previous) = entries.insert(
            task.id.clone(),
            Entry { expr: task.schedule.clone(), handle },
        ) {
            previous.handle.abort();
        }
        debug!(task_id = %task.id, schedule = %task.schedule, "task enrolled");
        Ok(())
    }

    pub fn remove_task(&self, task_id: &TaskId) {
        if let Some(entry) = self.entries.lock().remove(task_id) {
            entry.handle.abort();
            debug!(%task_id, "task unenrolled");
        }
    }

    /// Whether a task currently has an entry, and under which expression.
    pub fn entry_for(&self, task_id: &TaskId) -> Option<String> {
        self.entries.lock().get(task_id).map(|e| e.expr.clone())
    }

    pub fn stop(&self) {
        let mut entries = self.entries.lock();
        for (_, entry) in entries.drain() {
            entry.handle.abort();
        }
        info!("scheduler stopped");
    }

    fn spawn_entry(&self, task_id: TaskId, schedule: Schedule) -> AbortHandle {
        let sink = Arc::clone(&self.sink);
        let tasks = self.tasks.clone();
        tokio::spawn(async move {
            loop {
                let Some(next) = schedule.upcoming(Utc).next() else {
                    break;
                };
                let Ok(wait) = (next - Utc::now()).to_std() else {
                    // The instant passed while computing; try the next one.
                    continue;
                };
                tokio::time::sleep(wait).await;

                // Re-fetch: a task deleted since enrollment makes the tick
                // a no-op.
                match tasks.get(&task_id).await {
                    Ok(task) => sink.trigger(task, Trigger::Schedule).await,
                    Err(StorageError::NotFound { .. }) => {
                        debug!(%task_id, "task gone; dropping schedule entry");
                        break;
                    }
                    Err(e) => warn!(%task_id, error = %e, "schedule tick failed to load task"),
                }
            }
        })
        .abort_handle()
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
