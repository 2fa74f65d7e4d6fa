// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection rows.
//!
//! The gateway stores the provider configuration as the opaque encrypted
//! blob it was handed; encryption and decryption live in the service layer.

use crate::db::Db;
use crate::error::StorageError;
use chrono::{DateTime, Utc};
use skiff_core::ConnectionId;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

/// Persisted shape of a connection.
#[derive(Debug, Clone)]
pub struct ConnectionRecord {
    pub id: ConnectionId,
    pub name: String,
    pub provider_type: String,
    pub encrypted_config: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct ConnectionStore {
    db: Db,
}

impl ConnectionStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn insert(&self, record: &ConnectionRecord) -> Result<(), StorageError> {
        let result = sqlx::query(
            "INSERT INTO connections (id, name, provider_type, encrypted_config, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(record.id.as_str())
        .bind(&record.name)
        .bind(&record.provider_type)
        .bind(record.encrypted_config.as_slice())
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(self.db.pool())
        .await;
        match result {
            Ok(_) => Ok(()),
            Err(e) if StorageError::is_unique_violation(&e) => Err(StorageError::Conflict(
                format!("connection name already in use: {}", record.name),
            )),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn update(&self, record: &ConnectionRecord) -> Result<(), StorageError> {
        let result = sqlx::query(
            "UPDATE connections SET name = ?2, provider_type = ?3, encrypted_config = ?4, updated_at = ?5 \
             WHERE id = ?1",
        )
        .bind(record.id.as_str())
        .bind(&record.name)
        .bind(&record.provider_type)
        .bind(record.encrypted_config.as_slice())
        .bind(record.updated_at)
        .execute(self.db.pool())
        .await;
        match result {
            Ok(done) if done.rows_affected() == 0 => {
                Err(StorageError::not_found("connection", record.id.as_str()))
            }
            Ok(_) => Ok(()),
            Err(e) if StorageError::is_unique_violation(&e) => Err(StorageError::Conflict(
                format!("connection name already in use: {}", record.name),
            )),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(&self, id: &ConnectionId) -> Result<ConnectionRecord, StorageError> {
        sqlx::query("SELECT * FROM connections WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(self.db.pool())
            .await?
            .map(|row| record_from_row(&row))
            .transpose()?
            .ok_or_else(|| StorageError::not_found("connection", id.as_str()))
    }

    pub async fn get_by_name(&self, name: &str) -> Result<ConnectionRecord, StorageError> {
        sqlx::query("SELECT * FROM connections WHERE name = ?1")
            .bind(name)
            .fetch_optional(self.db.pool())
            .await?
            .map(|row| record_from_row(&row))
            .transpose()?
            .ok_or_else(|| StorageError::not_found("connection", name))
    }

    pub async fn list(&self) -> Result<Vec<ConnectionRecord>, StorageError> {
        let rows = sqlx::query("SELECT * FROM connections ORDER BY created_at")
            .fetch_all(self.db.pool())
            .await?;
        rows.iter().map(record_from_row).collect()
    }

    /// Delete a connection. Rejected with Conflict while any task still
    /// references it; job and log rows of a deletable connection are gone
    /// already (tasks cascade).
    pub async fn delete(&self, id: &ConnectionId) -> Result<(), StorageError> {
        let mut tx = self.db.pool().begin().await?;
        let (task_count,): (i64,) =
            sqlx::query_as("SELECT count(*) FROM tasks WHERE connection_id = ?1")
                .bind(id.as_str())
                .fetch_one(&mut *tx)
                .await?;
        if task_count > 0 {
            return Err(StorageError::Conflict(format!(
                "connection has {task_count} task(s); delete them first"
            )));
        }
        let done = sqlx::query("DELETE FROM connections WHERE id = ?1")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;
        if done.rows_affected() == 0 {
            return Err(StorageError::not_found("connection", id.as_str()));
        }
        tx.commit().await?;
        Ok(())
    }
}

fn record_from_row(row: &SqliteRow) -> Result<ConnectionRecord, StorageError> {
    Ok(ConnectionRecord {
        id: ConnectionId::from(row.try_get::<String, _>("id")?),
        name: row.try_get("name")?,
        provider_type: row.try_get("provider_type")?,
        encrypted_config: row.try_get("encrypted_config")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
#[path = "connections_tests.rs"]
mod tests;
