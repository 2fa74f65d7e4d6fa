// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use skiff_storage::{ConnectionRecord, ConnectionStore, Db, MigrationMode};
use std::time::Duration;

#[derive(Default)]
struct RecordingSink {
    triggers: Mutex<Vec<(TaskId, Trigger)>>,
}

#[async_trait]
impl TriggerSink for RecordingSink {
    async fn trigger(&self, task: Task, trigger: Trigger) {
        self.triggers.lock().push((task.id, trigger));
    }
}

async fn store() -> TaskStore {
    let db = Db::connect_in_memory().await.unwrap();
    db.migrate(MigrationMode::Versioned).await.unwrap();
    ConnectionStore::new(db.clone())
        .insert(&ConnectionRecord {
            id: "c1".into(),
            name: "remote-a".to_string(),
            provider_type: "local".to_string(),
            encrypted_config: b"{}".to_vec(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
        .await
        .unwrap();
    TaskStore::new(db)
}

#[tokio::test]
async fn add_task_validates_the_expression() {
    let tasks = store().await;
    let sink = Arc::new(RecordingSink::default());
    let scheduler = Scheduler::new(sink, tasks);

    let task = Task::builder().id("t1").connection_id("c1").schedule("bogus").build();
    let err = scheduler.add_task(&task).unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidSchedule { .. }));
    assert_eq!(err.kind(), ErrorKind::Validation);
    // No partial state.
    assert!(scheduler.entry_for(&task.id).is_none());
}

#[tokio::test]
async fn add_replaces_and_empty_schedule_removes() {
    let tasks = store().await;
    let scheduler = Scheduler::new(Arc::new(RecordingSink::default()), tasks);

    let mut task =
        Task::builder().id("t1").connection_id("c1").schedule("0 0 3 * * *").build();
    scheduler.add_task(&task).unwrap();
    assert_eq!(scheduler.entry_for(&task.id).as_deref(), Some("0 0 3 * * *"));

    task.schedule = "0 30 4 * * *".to_string();
    scheduler.add_task(&task).unwrap();
    assert_eq!(scheduler.entry_for(&task.id).as_deref(), Some("0 30 4 * * *"));

    task.schedule = String::new();
    scheduler.add_task(&task).unwrap();
    assert!(scheduler.entry_for(&task.id).is_none());

    scheduler.remove_task(&task.id); // idempotent
}

#[tokio::test]
async fn start_enrolls_scheduled_tasks_and_skips_bad_expressions() {
    let tasks = store().await;
    tasks
        .insert(&Task::builder().id("t1").connection_id("c1").schedule("0 0 3 * * *").build())
        .await
        .unwrap();
    tasks
        .insert(&Task::builder().id("t2").connection_id("c1").schedule("broken").build())
        .await
        .unwrap();
    tasks.insert(&Task::builder().id("t3").connection_id("c1").build()).await.unwrap();

    let scheduler = Scheduler::new(Arc::new(RecordingSink::default()), tasks);
    scheduler.start().await.unwrap();

    assert!(scheduler.entry_for(&"t1".into()).is_some());
    assert!(scheduler.entry_for(&"t2".into()).is_none());
    assert!(scheduler.entry_for(&"t3".into()).is_none());

    scheduler.stop();
    assert!(scheduler.entry_for(&"t1".into()).is_none());
}

#[tokio::test]
async fn tick_fires_the_sink_with_schedule_trigger() {
    let tasks = store().await;
    tasks
        .insert(&Task::builder().id("t1").connection_id("c1").schedule("* * * * * *").build())
        .await
        .unwrap();
    let sink = Arc::new(RecordingSink::default());
    let scheduler = Scheduler::new(sink.clone(), tasks.clone());
    scheduler.start().await.unwrap();

    let fired = async {
        loop {
            if let Some((task_id, trigger)) = sink.triggers.lock().first().cloned() {
                return (task_id, trigger);
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    };
    let (task_id, trigger) =
        tokio::time::timeout(Duration::from_secs(3), fired).await.unwrap();
    assert_eq!(task_id, "t1");
    assert_eq!(trigger, Trigger::Schedule);
    scheduler.stop();
}

#[tokio::test]
async fn tick_for_a_deleted_task_is_a_noop() {
    let tasks = store().await;
    tasks
        .insert(&Task::builder().id("t1").connection_id("c1").schedule("* * * * * *").build())
        .await
        .unwrap();
    let sink = Arc::new(RecordingSink::default());
    let scheduler = Scheduler::new(sink.clone(), tasks.clone());
    scheduler.start().await.unwrap();

    tasks.delete(&"t1".into()).await.unwrap();

    let deadline = Utc::now() + ChronoDuration::milliseconds(2500);
    while Utc::now() < deadline {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(sink.triggers.lock().is_empty());
    scheduler.stop();
}
