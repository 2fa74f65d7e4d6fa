// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-flight: a second start while a job runs is a conflict.

use super::harness::{rig, wait_idle};
use skiff_adapters::FakeEngine;
use skiff_core::{Classify, ErrorKind, JobStatus, Trigger};
use skiff_storage::{JobFilter, Paging};

#[tokio::test]
async fn second_start_is_rejected_with_exactly_one_job() {
    let (engine, release) = FakeEngine::blocking();
    let rig = rig(engine, Some(release)).await;
    let task = rig.tasks.get(&"t1".into()).await.unwrap();

    rig.runner.start_task(task.clone(), Trigger::Manual).await.unwrap();
    let err = rig.runner.start_task(task.clone(), Trigger::Manual).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let jobs = rig.jobs.list(&JobFilter::default(), Paging::default()).await.unwrap();
    assert_eq!(jobs.len(), 1);

    rig.release.as_ref().unwrap().release();
    wait_idle(&rig.runner, &task.id).await;
    assert_eq!(rig.jobs.get(&jobs[0].id).await.unwrap().status, JobStatus::Success);
}
