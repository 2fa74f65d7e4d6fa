// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sync task definitions.

use crate::connection::ConnectionId;
use crate::error::ParseEnumError;
use crate::filter::{FilterParseError, FilterRule};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

crate::define_id! {
    /// Unique identifier for a task.
    pub struct TaskId;
}

/// Direction of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncDirection {
    Upload,
    Download,
    Bidirectional,
}

impl SyncDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncDirection::Upload => "UPLOAD",
            SyncDirection::Download => "DOWNLOAD",
            SyncDirection::Bidirectional => "BIDIRECTIONAL",
        }
    }
}

impl FromStr for SyncDirection {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UPLOAD" => Ok(SyncDirection::Upload),
            "DOWNLOAD" => Ok(SyncDirection::Download),
            "BIDIRECTIONAL" => Ok(SyncDirection::Bidirectional),
            other => Err(ParseEnumError::new("sync direction", other)),
        }
    }
}

crate::simple_display! {
    SyncDirection {
        Upload => "UPLOAD",
        Download => "DOWNLOAD",
        Bidirectional => "BIDIRECTIONAL",
    }
}

/// How a bidirectional run settles a file changed on both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictResolution {
    /// The side with the newer modification time wins.
    #[default]
    Newer,
    /// The larger file wins.
    Larger,
    /// The first (local) side wins.
    Path1,
    /// The second (remote) side wins.
    Path2,
}

/// Lower bound for the parallel-transfer setting.
pub const MIN_TRANSFERS: u32 = 1;
/// Upper bound for the parallel-transfer setting.
pub const MAX_TRANSFERS: u32 = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OptionsError {
    #[error(transparent)]
    Filter(#[from] FilterParseError),
    #[error("transfers must be between {MIN_TRANSFERS} and {MAX_TRANSFERS}, got {0}")]
    TransfersOutOfRange(u32),
}

impl crate::error::Classify for OptionsError {
    fn kind(&self) -> crate::error::ErrorKind {
        crate::error::ErrorKind::Validation
    }
}

/// Structured per-task sync options, persisted as a JSON column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskOptions {
    pub conflict_resolution: ConflictResolution,
    /// Raw `+ PATTERN` / `- PATTERN` rule strings, in evaluation order.
    pub filters: Vec<String>,
    /// Never delete on the destination. Ignored for bidirectional tasks.
    pub no_delete: bool,
    /// Parallel transfer count; `None` defers to the global config.
    pub transfers: Option<u32>,
}

impl TaskOptions {
    pub fn validate(&self) -> Result<(), OptionsError> {
        FilterRule::parse_all(&self.filters)?;
        if let Some(n) = self.transfers {
            if !(MIN_TRANSFERS..=MAX_TRANSFERS).contains(&n) {
                return Err(OptionsError::TransfersOutOfRange(n));
            }
        }
        Ok(())
    }

    /// Parsed filter rules, in order.
    pub fn filter_rules(&self) -> Result<Vec<FilterRule>, FilterParseError> {
        FilterRule::parse_all(&self.filters)
    }
}

/// A user-defined sync specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    /// Local filesystem root of the sync.
    pub source_path: PathBuf,
    pub connection_id: ConnectionId,
    /// Path on the remote, relative to the connection's root.
    pub remote_path: String,
    pub direction: SyncDirection,
    /// Cron expression; empty means not scheduled.
    pub schedule: String,
    /// Trigger runs from filesystem events on `source_path`.
    pub realtime: bool,
    pub options: TaskOptions,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// `no_delete` applies to one-way runs only.
    pub fn deletes_extraneous(&self) -> bool {
        self.direction != SyncDirection::Bidirectional && !self.options.no_delete
    }
}

crate::builder! {
    pub struct TaskBuilder => Task {
        into {
            id: TaskId = TaskId::from("22222222-2222-4222-8222-222222222222"),
            name: String = "test-task",
            source_path: PathBuf = "/tmp/src",
            connection_id: ConnectionId = ConnectionId::from("11111111-1111-4111-8111-111111111111"),
            remote_path: String = "backup",
            schedule: String = "",
        }
        set {
            direction: SyncDirection = SyncDirection::Upload,
            realtime: bool = false,
            options: TaskOptions = TaskOptions::default(),
            created_at: DateTime<Utc> = Utc::now(),
            updated_at: DateTime<Utc> = Utc::now(),
        }
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
