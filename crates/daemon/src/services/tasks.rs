// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task CRUD plus trigger-source enrollment.
//!
//! A saved task is immediately live: its schedule entry and watch
//! registration are updated in the same call. Validation happens before
//! any row is written.

use super::ServiceError;
use cron::Schedule;
use skiff_adapters::TransferEngine;
use skiff_core::{Clock, SyncDirection, Task, TaskId, TaskOptions};
use skiff_engine::{Runner, Scheduler, Watcher};
use skiff_storage::{ConnectionStore, TaskStore};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Input shape for create/update.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub name: String,
    pub source_path: PathBuf,
    pub connection_id: skiff_core::ConnectionId,
    pub remote_path: String,
    pub direction: SyncDirection,
    pub schedule: String,
    pub realtime: bool,
    pub options: TaskOptions,
}

pub struct TaskService<C: Clock> {
    store: TaskStore,
    connections: ConnectionStore,
    engine: Arc<dyn TransferEngine>,
    runner: Arc<Runner<C>>,
    scheduler: Arc<Scheduler>,
    watcher: Arc<Watcher>,
    clock: C,
}

impl<C: Clock> TaskService<C> {
    pub fn new(
        store: TaskStore,
        connections: ConnectionStore,
        engine: Arc<dyn TransferEngine>,
        runner: Arc<Runner<C>>,
        scheduler: Arc<Scheduler>,
        watcher: Arc<Watcher>,
        clock: C,
    ) -> Self {
        Self { store, connections, engine, runner, scheduler, watcher, clock }
    }

    pub async fn create(&self, input: NewTask) -> Result<Task, ServiceError> {
        self.validate(&input).await?;
        let now = self.clock.now_utc();
        let task = Task {
            id: TaskId::new(),
            name: input.name,
            source_path: input.source_path,
            connection_id: input.connection_id,
            remote_path: input.remote_path,
            direction: input.direction,
            schedule: input.schedule,
            realtime: input.realtime,
            options: input.options,
            created_at: now,
            updated_at: now,
        };
        self.store.insert(&task).await?;
        self.enroll(&task)?;
        info!(task_id = %task.id, name = %task.name, "task created");
        Ok(task)
    }

    pub async fn update(&self, id: &TaskId, input: NewTask) -> Result<Task, ServiceError> {
        self.validate(&input).await?;
        let previous = self.store.get(id).await?;
        let task = Task {
            id: id.clone(),
            name: input.name,
            source_path: input.source_path,
            connection_id: input.connection_id,
            remote_path: input.remote_path,
            direction: input.direction,
            schedule: input.schedule,
            realtime: input.realtime,
            options: input.options,
            created_at: previous.created_at,
            updated_at: self.clock.now_utc(),
        };
        self.store.update(&task).await?;
        self.enroll(&task)?;
        info!(task_id = %task.id, "task updated");
        Ok(task)
    }

    /// Cancel any running job, unenroll the task, and delete it. Job and
    /// log rows cascade away with the task.
    pub async fn delete(&self, id: &TaskId) -> Result<(), ServiceError> {
        self.runner.stop_task(id);
        self.scheduler.remove_task(id);
        self.watcher.remove_task(id);
        self.store.delete(id).await?;
        info!(task_id = %id, "task deleted");
        Ok(())
    }

    pub async fn get(&self, id: &TaskId) -> Result<Task, ServiceError> {
        Ok(self.store.get(id).await?)
    }

    pub async fn list(&self) -> Result<Vec<Task>, ServiceError> {
        Ok(self.store.list().await?)
    }

    /// Keep scheduler and watcher in step with the saved task.
    fn enroll(&self, task: &Task) -> Result<(), ServiceError> {
        self.scheduler.add_task(task)?;
        self.watcher.add_task(task)?;
        Ok(())
    }

    async fn validate(&self, input: &NewTask) -> Result<(), ServiceError> {
        if input.name.trim().is_empty() {
            return Err(ServiceError::Validation("task name must not be empty".into()));
        }
        if input.source_path.as_os_str().is_empty() {
            return Err(ServiceError::Validation("source path must not be empty".into()));
        }
        if input.remote_path.trim().is_empty() {
            return Err(ServiceError::Validation("remote path must not be empty".into()));
        }
        input.options.validate()?;
        for rule in &input.options.filters {
            self.engine.validate_filter_rule(rule)?;
        }
        if !input.schedule.is_empty() {
            Schedule::from_str(&input.schedule).map_err(|e| {
                ServiceError::Validation(format!("invalid schedule {:?}: {e}", input.schedule))
            })?;
        }
        // The referenced connection must exist.
        self.connections.get(&input.connection_id).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tasks_tests.rs"]
mod tests;
