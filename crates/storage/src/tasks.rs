// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task rows. Options are persisted as a JSON column.

use crate::db::Db;
use crate::error::StorageError;
use skiff_core::{ConnectionId, SyncDirection, Task, TaskId, TaskOptions};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::path::PathBuf;

#[derive(Clone)]
pub struct TaskStore {
    db: Db,
}

impl TaskStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn insert(&self, task: &Task) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO tasks (id, name, source_path, connection_id, remote_path, direction, \
             schedule, realtime, options, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .bind(task.id.as_str())
        .bind(&task.name)
        .bind(task.source_path.to_string_lossy().into_owned())
        .bind(task.connection_id.as_str())
        .bind(&task.remote_path)
        .bind(task.direction.as_str())
        .bind(&task.schedule)
        .bind(task.realtime)
        .bind(serde_json::to_string(&task.options)?)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    pub async fn update(&self, task: &Task) -> Result<(), StorageError> {
        let done = sqlx::query(
            "UPDATE tasks SET name = ?2, source_path = ?3, connection_id = ?4, remote_path = ?5, \
             direction = ?6, schedule = ?7, realtime = ?8, options = ?9, updated_at = ?10 \
             WHERE id = ?1",
        )
        .bind(task.id.as_str())
        .bind(&task.name)
        .bind(task.source_path.to_string_lossy().into_owned())
        .bind(task.connection_id.as_str())
        .bind(&task.remote_path)
        .bind(task.direction.as_str())
        .bind(&task.schedule)
        .bind(task.realtime)
        .bind(serde_json::to_string(&task.options)?)
        .bind(task.updated_at)
        .execute(self.db.pool())
        .await?;
        if done.rows_affected() == 0 {
            return Err(StorageError::not_found("task", task.id.as_str()));
        }
        Ok(())
    }

    pub async fn get(&self, id: &TaskId) -> Result<Task, StorageError> {
        sqlx::query("SELECT * FROM tasks WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(self.db.pool())
            .await?
            .map(|row| task_from_row(&row))
            .transpose()?
            .ok_or_else(|| StorageError::not_found("task", id.as_str()))
    }

    pub async fn list(&self) -> Result<Vec<Task>, StorageError> {
        let rows = sqlx::query("SELECT * FROM tasks ORDER BY created_at")
            .fetch_all(self.db.pool())
            .await?;
        rows.iter().map(task_from_row).collect()
    }

    pub async fn list_by_connection(
        &self,
        connection_id: &ConnectionId,
    ) -> Result<Vec<Task>, StorageError> {
        let rows = sqlx::query("SELECT * FROM tasks WHERE connection_id = ?1 ORDER BY created_at")
            .bind(connection_id.as_str())
            .fetch_all(self.db.pool())
            .await?;
        rows.iter().map(task_from_row).collect()
    }

    /// Tasks with a non-empty cron schedule.
    pub async fn list_scheduled(&self) -> Result<Vec<Task>, StorageError> {
        let rows = sqlx::query("SELECT * FROM tasks WHERE schedule != '' ORDER BY created_at")
            .fetch_all(self.db.pool())
            .await?;
        rows.iter().map(task_from_row).collect()
    }

    /// Tasks watching their source path.
    pub async fn list_realtime(&self) -> Result<Vec<Task>, StorageError> {
        let rows = sqlx::query("SELECT * FROM tasks WHERE realtime = 1 ORDER BY created_at")
            .fetch_all(self.db.pool())
            .await?;
        rows.iter().map(task_from_row).collect()
    }

    /// Delete a task; its jobs and their logs cascade.
    pub async fn delete(&self, id: &TaskId) -> Result<(), StorageError> {
        let done = sqlx::query("DELETE FROM tasks WHERE id = ?1")
            .bind(id.as_str())
            .execute(self.db.pool())
            .await?;
        if done.rows_affected() == 0 {
            return Err(StorageError::not_found("task", id.as_str()));
        }
        Ok(())
    }
}

fn task_from_row(row: &SqliteRow) -> Result<Task, StorageError> {
    let direction: String = row.try_get("direction")?;
    let options: String = row.try_get("options")?;
    Ok(Task {
        id: TaskId::from(row.try_get::<String, _>("id")?),
        name: row.try_get("name")?,
        source_path: PathBuf::from(row.try_get::<String, _>("source_path")?),
        connection_id: ConnectionId::from(row.try_get::<String, _>("connection_id")?),
        remote_path: row.try_get("remote_path")?,
        direction: direction.parse::<SyncDirection>()?,
        schedule: row.try_get("schedule")?,
        realtime: row.try_get("realtime")?,
        options: serde_json::from_str::<TaskOptions>(&options)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
#[path = "tasks_tests.rs"]
mod tests;
