// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-file job log rows.

use crate::error::ParseEnumError;
use crate::job::JobId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INFO" => Ok(LogLevel::Info),
            "WARN" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            other => Err(ParseEnumError::new("log level", other)),
        }
    }
}

/// What happened to the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogAction {
    Copied,
    Deleted,
    Moved,
    Skipped,
    Error,
    Unknown,
}

impl LogAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogAction::Copied => "COPIED",
            LogAction::Deleted => "DELETED",
            LogAction::Moved => "MOVED",
            LogAction::Skipped => "SKIPPED",
            LogAction::Error => "ERROR",
            LogAction::Unknown => "UNKNOWN",
        }
    }
}

impl FromStr for LogAction {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COPIED" => Ok(LogAction::Copied),
            "DELETED" => Ok(LogAction::Deleted),
            "MOVED" => Ok(LogAction::Moved),
            "SKIPPED" => Ok(LogAction::Skipped),
            "ERROR" => Ok(LogAction::Error),
            "UNKNOWN" => Ok(LogAction::Unknown),
            other => Err(ParseEnumError::new("log action", other)),
        }
    }
}

/// A persisted per-file event, ordered by `time` within a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobLog {
    pub id: i64,
    pub job_id: JobId,
    pub level: LogLevel,
    pub time: DateTime<Utc>,
    pub path: Option<String>,
    pub action: LogAction,
    pub size: Option<u64>,
}

/// Insert form of [`JobLog`]; the database assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewJobLog {
    pub level: LogLevel,
    pub time: DateTime<Utc>,
    pub path: Option<String>,
    pub action: LogAction,
    pub size: Option<u64>,
}

impl NewJobLog {
    /// A COPIED info row for a completed transfer.
    pub fn copied(path: impl Into<String>, size: u64, time: DateTime<Utc>) -> Self {
        Self {
            level: LogLevel::Info,
            time,
            path: Some(path.into()),
            action: LogAction::Copied,
            size: Some(size),
        }
    }

    /// A DELETED info row.
    pub fn deleted(path: impl Into<String>, time: DateTime<Utc>) -> Self {
        Self {
            level: LogLevel::Info,
            time,
            path: Some(path.into()),
            action: LogAction::Deleted,
            size: None,
        }
    }

    /// An ERROR row with the failing path.
    pub fn error(path: impl Into<String>, time: DateTime<Utc>) -> Self {
        Self {
            level: LogLevel::Error,
            time,
            path: Some(path.into()),
            action: LogAction::Error,
            size: None,
        }
    }
}
