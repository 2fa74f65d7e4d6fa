// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic job-log retention.
//!
//! Enabled when both the per-connection cap and the cron schedule are
//! configured. Each tick trims every connection down to the newest N log
//! rows with a single delete statement per connection.

use crate::scheduler::SchedulerError;
use chrono::Utc;
use cron::Schedule;
use parking_lot::Mutex;
use skiff_storage::{ConnectionStore, JobStore};
use std::str::FromStr;
use std::sync::Arc;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

pub struct LogCleanup {
    jobs: JobStore,
    connections: ConnectionStore,
    max_logs: u32,
    schedule: Schedule,
    handle: Mutex<Option<AbortHandle>>,
}

impl LogCleanup {
    /// Returns `None` when disabled (cap of zero or empty schedule).
    pub fn new(
        jobs: JobStore,
        connections: ConnectionStore,
        max_logs_per_connection: u32,
        cron_schedule: &str,
    ) -> Result<Option<Arc<Self>>, SchedulerError> {
        if max_logs_per_connection == 0 || cron_schedule.is_empty() {
            return Ok(None);
        }
        let schedule = Schedule::from_str(cron_schedule).map_err(|source| {
            SchedulerError::InvalidSchedule { expr: cron_schedule.to_string(), source }
        })?;
        Ok(Some(Arc::new(Self {
            jobs,
            connections,
            max_logs: max_logs_per_connection,
            schedule,
            handle: Mutex::new(None),
        })))
    }

    pub fn start(&self) {
        let jobs = self.jobs.clone();
        let connections = self.connections.clone();
        let max_logs = self.max_logs;
        let schedule = self.schedule.clone();
        let handle = tokio::spawn(async move {
            loop {
                let Some(next) = schedule.upcoming(Utc).next() else {
                    break;
                };
                let Ok(wait) = (next - Utc::now()).to_std() else {
                    continue;
                };
                tokio::time::sleep(wait).await;
                sweep(&jobs, &connections, max_logs).await;
            }
        })
        .abort_handle();
        if let Some(previous) = self.handle.lock().replace(handle) {
            previous.abort();
        }
        info!(max_logs = self.max_logs, "log cleanup scheduled");
    }

    pub fn stop(&self) {
        if let Some(handle) = self.handle.lock().take() {
            handle.abort();
        }
    }

    /// One sweep over every connection. Idempotent.
    pub async fn run_once(&self) {
        sweep(&self.jobs, &self.connections, self.max_logs).await;
    }
}

async fn sweep(jobs: &JobStore, connections: &ConnectionStore, max_logs: u32) {
    let connections = match connections.list().await {
        Ok(connections) => connections,
        Err(e) => {
            warn!(error = %e, "log cleanup could not list connections");
            return;
        }
    };
    for connection in connections {
        match jobs.trim_connection_logs(&connection.id, max_logs).await {
            Ok(0) => {}
            Ok(removed) => {
                debug!(connection = %connection.name, removed, "trimmed job logs");
            }
            Err(e) => {
                warn!(connection = %connection.name, error = %e, "log trim failed");
            }
        }
    }
}

#[cfg(test)]
#[path = "cleanup_tests.rs"]
mod tests;
