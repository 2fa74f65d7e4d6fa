// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Database handle and migration modes.

use crate::error::StorageError;
use skiff_core::ParseEnumError;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// How schema changes are applied at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MigrationMode {
    /// Sequential migrations tracked in `_sqlx_migrations`.
    #[default]
    Versioned,
    /// Re-execute the idempotent schema script on every start.
    Auto,
}

impl FromStr for MigrationMode {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "versioned" => Ok(MigrationMode::Versioned),
            "auto" => Ok(MigrationMode::Auto),
            other => Err(ParseEnumError::new("migration mode", other)),
        }
    }
}

/// Shared database handle. Connections are owned and pooled by the driver.
#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
}

impl Db {
    /// Open (creating if missing) the database at `path`.
    ///
    /// Pinned pragmas: foreign keys on, WAL journal, 5 s busy timeout,
    /// synchronous NORMAL.
    pub async fn connect(path: &Path) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_millis(5000))
            .synchronous(SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        info!(path = %path.display(), "opened database");
        Ok(Self { pool })
    }

    /// In-memory database for tests. Capped to a single pooled connection
    /// so every query sees the same memory store.
    pub async fn connect_in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool =
            SqlitePoolOptions::new().max_connections(1).connect_with(options).await?;
        Ok(Self { pool })
    }

    /// Apply the schema according to `mode`.
    pub async fn migrate(&self, mode: MigrationMode) -> Result<(), StorageError> {
        match mode {
            MigrationMode::Versioned => {
                sqlx::migrate!("./migrations").run(&self.pool).await?;
            }
            MigrationMode::Auto => {
                sqlx::raw_sql(include_str!("../migrations/0001_initial.sql"))
                    .execute(&self.pool)
                    .await?;
            }
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
#[path = "db_tests.rs"]
mod tests;
