// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup sweep: RUNNING rows from a dead process become FAILED.

use super::harness::rig;
use chrono::Utc;
use skiff_adapters::FakeEngine;
use skiff_core::{JobStatus, Trigger};
use skiff_engine::CRASH_REASON;
use skiff_storage::{JobFilter, Paging};

#[tokio::test]
async fn stuck_jobs_are_failed_and_no_workers_spawn() {
    let rig = rig(FakeEngine::succeeding(), None).await;

    // Two jobs a crashed process left RUNNING.
    let j1 = rig.jobs.create_job(&"t1".into(), Trigger::Manual, Utc::now()).await.unwrap();
    let j2 = rig.jobs.create_job(&"t1".into(), Trigger::Schedule, Utc::now()).await.unwrap();

    rig.runner.start().await;

    for id in [&j1.id, &j2.id] {
        let job = rig.jobs.get(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.errors.as_deref(), Some(CRASH_REASON));
        assert!(job.end_time.is_some());
    }
    // No engine invocation happened for either row.
    assert!(rig.engine.calls().is_empty());
    assert!(!rig.runner.is_running(&"t1".into()));

    // Running the sweep twice changes nothing further.
    rig.runner.start().await;
    let jobs = rig.jobs.list(&JobFilter::default(), Paging::default()).await.unwrap();
    assert_eq!(jobs.len(), 2);
    assert!(jobs.iter().all(|j| j.status == JobStatus::Failed));
}
