// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use skiff_core::{Classify, ErrorKind, ParseEnumError};
use thiserror::Error;

/// Errors surfaced by the persistence gateway.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },
    #[error("{0}")]
    Conflict(String),
    #[error("corrupt row: {0}")]
    Corrupt(#[from] ParseEnumError),
    #[error("corrupt options column: {0}")]
    CorruptOptions(#[from] serde_json::Error),
}

impl StorageError {
    pub(crate) fn not_found(what: &'static str, id: impl Into<String>) -> Self {
        StorageError::NotFound { what, id: id.into() }
    }

    /// True when the underlying database error is a UNIQUE violation.
    pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
        matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
    }
}

impl Classify for StorageError {
    fn kind(&self) -> ErrorKind {
        match self {
            StorageError::NotFound { .. } => ErrorKind::NotFound,
            StorageError::Conflict(_) => ErrorKind::Conflict,
            StorageError::Db(_) | StorageError::Migration(_) => ErrorKind::External,
            StorageError::Corrupt(_) | StorageError::CorruptOptions(_) => ErrorKind::Internal,
        }
    }
}
