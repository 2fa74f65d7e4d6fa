// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ephemeral progress snapshots published on the in-process buses.
//!
//! Never persisted; derived from the job row plus live engine stats. For a
//! given job, snapshots are published in non-decreasing
//! `(files_transferred, bytes_transferred)` order and the last one carries
//! the terminal status.

use crate::connection::ConnectionId;
use crate::job::{JobId, JobStatus};
use crate::task::TaskId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Events that can be filtered by their (connection, task, job) scope.
pub trait Scoped {
    fn connection_id(&self) -> &ConnectionId;
    fn task_id(&self) -> &TaskId;
    fn job_id(&self) -> &JobId;
}

/// Subscriber-side selection. `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub connection_id: Option<ConnectionId>,
    pub task_id: Option<TaskId>,
    pub job_id: Option<JobId>,
}

impl EventFilter {
    pub fn matches<E: Scoped>(&self, event: &E) -> bool {
        if let Some(ref c) = self.connection_id {
            if c != event.connection_id() {
                return false;
            }
        }
        if let Some(ref t) = self.task_id {
            if t != event.task_id() {
                return false;
            }
        }
        if let Some(ref j) = self.job_id {
            if j != event.job_id() {
                return false;
            }
        }
        true
    }
}

/// Job-level progress snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    pub job_id: JobId,
    pub task_id: TaskId,
    pub connection_id: ConnectionId,
    pub status: JobStatus,
    pub files_transferred: u64,
    pub bytes_transferred: u64,
    pub files_total: u64,
    pub bytes_total: u64,
    pub files_deleted: u64,
    pub error_count: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl Scoped for JobProgress {
    fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }

    fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    fn job_id(&self) -> &JobId {
        &self.job_id
    }
}

/// One in-flight file transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTransfer {
    pub name: String,
    pub size: u64,
    pub bytes: u64,
}

/// Per-file in-flight view for the subscription API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferActivity {
    pub job_id: JobId,
    pub task_id: TaskId,
    pub connection_id: ConnectionId,
    pub transfers: Vec<FileTransfer>,
}

impl Scoped for TransferActivity {
    fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }

    fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    fn job_id(&self) -> &JobId {
        &self.job_id
    }
}

#[cfg(test)]
#[path = "progress_tests.rs"]
mod tests;
