// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mid-transfer cancellation lands as CANCELLED with a terminal snapshot.

use super::harness::{rig, wait_idle};
use skiff_adapters::FakeEngine;
use skiff_core::{EventFilter, JobStatus, Trigger};

#[tokio::test]
async fn stop_task_cancels_and_publishes_cancelled() {
    let (engine, release) = FakeEngine::blocking();
    let rig = rig(engine, Some(release)).await;
    let task = rig.tasks.get(&"t1".into()).await.unwrap();
    let mut sub = rig.progress.subscribe(EventFilter::default());

    let job = rig.runner.start_task(task.clone(), Trigger::Manual).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    assert!(rig.runner.stop_task(&task.id));
    wait_idle(&rig.runner, &task.id).await;

    let row = rig.jobs.get(&job.id).await.unwrap();
    assert_eq!(row.status, JobStatus::Cancelled);
    assert!(row.end_time.is_some());

    let mut last = None;
    while let Some(event) = sub.try_recv() {
        last = Some(event);
    }
    assert_eq!(last.expect("terminal snapshot").status, JobStatus::Cancelled);
}
