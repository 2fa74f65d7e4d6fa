// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-job engine statistics.
//!
//! Each run gets its own group, so one job's counters never bleed into
//! another's. The engine writes; the orchestrator polls. Completed
//! transfers accumulate until drained so the poll loop can turn them into
//! job-log rows without losing any to timing.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use skiff_core::{FileTransfer, JobStats, LogAction};
use std::sync::Arc;

/// A finished per-file event, ready to become a job-log row.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedTransfer {
    pub path: String,
    pub size: Option<u64>,
    pub action: LogAction,
    pub finished_at: DateTime<Utc>,
}

/// Point-in-time view of a group's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub stats: JobStats,
    pub files_total: u64,
    pub bytes_total: u64,
}

#[derive(Default)]
struct StatsInner {
    snapshot: StatsSnapshot,
    in_flight: Vec<FileTransfer>,
    completed: Vec<CompletedTransfer>,
}

/// Shared counter set for one engine invocation.
#[derive(Clone, Default)]
pub struct StatsGroup {
    inner: Arc<Mutex<StatsInner>>,
}

impl StatsGroup {
    pub fn new() -> Self {
        Self::default()
    }

    // Engine-side writers ---------------------------------------------------

    pub fn set_totals(&self, files: u64, bytes: u64) {
        let mut inner = self.inner.lock();
        inner.snapshot.files_total = files;
        inner.snapshot.bytes_total = bytes;
    }

    /// Register an in-flight transfer.
    pub fn start_transfer(&self, name: impl Into<String>, size: u64) {
        self.inner.lock().in_flight.push(FileTransfer { name: name.into(), size, bytes: 0 });
    }

    /// Update bytes moved for an in-flight transfer.
    pub fn transfer_progress(&self, name: &str, bytes: u64) {
        let mut inner = self.inner.lock();
        if let Some(t) = inner.in_flight.iter_mut().find(|t| t.name == name) {
            t.bytes = bytes;
        }
    }

    /// Move a transfer from in-flight to completed and bump counters.
    pub fn finish_transfer(&self, name: &str, size: u64, finished_at: DateTime<Utc>) {
        let mut inner = self.inner.lock();
        inner.in_flight.retain(|t| t.name != name);
        inner.snapshot.stats.files_transferred += 1;
        inner.snapshot.stats.bytes_transferred += size;
        inner.completed.push(CompletedTransfer {
            path: name.to_string(),
            size: Some(size),
            action: LogAction::Copied,
            finished_at,
        });
    }

    pub fn record_deleted(&self, path: impl Into<String>, at: DateTime<Utc>) {
        let mut inner = self.inner.lock();
        inner.snapshot.stats.files_deleted += 1;
        inner.completed.push(CompletedTransfer {
            path: path.into(),
            size: None,
            action: LogAction::Deleted,
            finished_at: at,
        });
    }

    pub fn record_skipped(&self, path: impl Into<String>, at: DateTime<Utc>) {
        self.inner.lock().completed.push(CompletedTransfer {
            path: path.into(),
            size: None,
            action: LogAction::Skipped,
            finished_at: at,
        });
    }

    pub fn record_error(&self, path: impl Into<String>, at: DateTime<Utc>) {
        let mut inner = self.inner.lock();
        let path = path.into();
        inner.in_flight.retain(|t| t.name != path);
        inner.snapshot.stats.error_count += 1;
        inner.completed.push(CompletedTransfer {
            path,
            size: None,
            action: LogAction::Error,
            finished_at: at,
        });
    }

    // Orchestrator-side readers ---------------------------------------------

    pub fn snapshot(&self) -> StatsSnapshot {
        self.inner.lock().snapshot
    }

    pub fn in_flight(&self) -> Vec<FileTransfer> {
        self.inner.lock().in_flight.clone()
    }

    /// Completed transfers without draining them.
    pub fn completed(&self) -> Vec<CompletedTransfer> {
        self.inner.lock().completed.clone()
    }

    /// Read and clear the completed list, bounding retention.
    pub fn drain_completed(&self) -> Vec<CompletedTransfer> {
        std::mem::take(&mut self.inner.lock().completed)
    }
}

#[cfg(test)]
#[path = "stats_tests.rs"]
mod tests;
