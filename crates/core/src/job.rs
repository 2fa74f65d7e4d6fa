// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job identifier, status lattice, and counters.

use crate::error::ParseEnumError;
use crate::task::TaskId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

crate::define_id! {
    /// Unique identifier for a job: one supervised execution of a task.
    pub struct JobId;
}

/// Job lifecycle status.
///
/// Transitions form a path `PENDING → RUNNING → {SUCCESS, FAILED,
/// CANCELLED}`; the persistence gateway rejects any write that would
/// regress through that lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Success,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Every status, for iterating the lattice.
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Pending,
        JobStatus::Running,
        JobStatus::Success,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failed | JobStatus::Cancelled)
    }

    /// Whether a write moving `self → to` is a legal forward step. The
    /// persistence gateway derives its status guards from this predicate.
    pub fn can_transition(&self, to: JobStatus) -> bool {
        match self {
            JobStatus::Pending => to != JobStatus::Pending,
            JobStatus::Running => to.is_terminal(),
            _ => false,
        }
    }

    /// Statuses a row may currently hold for a write to `to` to be legal.
    pub fn predecessors(to: JobStatus) -> impl Iterator<Item = JobStatus> {
        JobStatus::ALL.into_iter().filter(move |from| from.can_transition(to))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Success => "SUCCESS",
            JobStatus::Failed => "FAILED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }
}

impl FromStr for JobStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(JobStatus::Pending),
            "RUNNING" => Ok(JobStatus::Running),
            "SUCCESS" => Ok(JobStatus::Success),
            "FAILED" => Ok(JobStatus::Failed),
            "CANCELLED" => Ok(JobStatus::Cancelled),
            other => Err(ParseEnumError::new("job status", other)),
        }
    }
}

crate::simple_display! {
    JobStatus {
        Pending => "PENDING",
        Running => "RUNNING",
        Success => "SUCCESS",
        Failed => "FAILED",
        Cancelled => "CANCELLED",
    }
}

/// What caused a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trigger {
    Manual,
    Schedule,
    Realtime,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::Manual => "MANUAL",
            Trigger::Schedule => "SCHEDULE",
            Trigger::Realtime => "REALTIME",
        }
    }
}

impl FromStr for Trigger {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MANUAL" => Ok(Trigger::Manual),
            "SCHEDULE" => Ok(Trigger::Schedule),
            "REALTIME" => Ok(Trigger::Realtime),
            other => Err(ParseEnumError::new("trigger", other)),
        }
    }
}

crate::simple_display! {
    Trigger {
        Manual => "MANUAL",
        Schedule => "SCHEDULE",
        Realtime => "REALTIME",
    }
}

/// Cumulative counters for a job, written live while it runs and once
/// more at finalization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStats {
    pub files_transferred: u64,
    pub bytes_transferred: u64,
    pub files_deleted: u64,
    pub error_count: u64,
}

impl JobStats {
    pub fn is_empty(&self) -> bool {
        *self == JobStats::default()
    }
}

/// One execution of a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub task_id: TaskId,
    pub status: JobStatus,
    pub trigger: Trigger,
    pub start_time: DateTime<Utc>,
    /// Set exactly when the status becomes terminal.
    pub end_time: Option<DateTime<Utc>>,
    pub stats: JobStats,
    /// Error text for FAILED jobs.
    pub errors: Option<String>,
}

crate::builder! {
    pub struct JobBuilder => Job {
        into {
            id: JobId = JobId::from("33333333-3333-4333-8333-333333333333"),
            task_id: TaskId = TaskId::from("22222222-2222-4222-8222-222222222222"),
        }
        set {
            status: JobStatus = JobStatus::Running,
            trigger: Trigger = Trigger::Manual,
            stats: JobStats = JobStats::default(),
            start_time: DateTime<Utc> = Utc::now(),
        }
        option {
            end_time: DateTime<Utc>,
            errors: String,
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
