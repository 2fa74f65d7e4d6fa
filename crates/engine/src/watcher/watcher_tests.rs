// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use async_trait::async_trait;
use chrono::Utc;
use skiff_storage::{ConnectionRecord, ConnectionStore, Db, MigrationMode};
use std::fs;
use tempfile::TempDir;

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

struct Harness {
    _source: TempDir,
    source_path: std::path::PathBuf,
    sink: Arc<RecordingSink>,
    watcher: Watcher,
}

async fn harness(window: Duration) -> Harness {
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
    let source = TempDir::new().unwrap();
    let tasks = TaskStore::new(db.clone());
    tasks
        .insert(
            &Task::builder()
                .id("t1")
                .connection_id("c1")
                .source_path(source.path())
                .realtime(true)
                .build(),
        )
        .await
        .unwrap();

    let sink = Arc::new(RecordingSink::default());
    let watcher = Watcher::with_debounce(sink.clone(), tasks, window).unwrap();
    let source_path = source.path().to_path_buf();
    Harness { _source: source, source_path, sink, watcher }
}

async fn wait_for_triggers(sink: &RecordingSink, expected: usize) {
    for _ in 0..300 {
        if sink.triggers.lock().len() >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {expected} trigger(s), saw {:?}", sink.triggers.lock().len());
}

#[tokio::test]
async fn burst_of_writes_collapses_to_one_trigger() {
    let h = harness(Duration::from_millis(250)).await;
    h.watcher.start().await.unwrap();
    assert_eq!(h.watcher.watched_tasks().len(), 1);

    for i in 0..4 {
        fs::write(h.source_path.join("x"), format!("rev {i}")).unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
    }

    wait_for_triggers(&h.sink, 1).await;
    // Idle past another window: no further trigger from the same burst.
    tokio::time::sleep(Duration::from_millis(500)).await;
    let triggers = h.sink.triggers.lock().clone();
    assert_eq!(triggers.len(), 1);
    assert_eq!(triggers[0], (TaskId::from("t1"), Trigger::Realtime));
}

#[tokio::test]
async fn start_is_idempotent_and_stop_is_final() {
    let h = harness(Duration::from_millis(100)).await;
    h.watcher.start().await.unwrap();
    h.watcher.start().await.unwrap();

    h.watcher.stop();
    h.watcher.stop();
    assert!(matches!(h.watcher.start().await.unwrap_err(), WatchError::Stopped));

    let task = Task::builder().id("t2").connection_id("c1").realtime(true).build();
    assert!(matches!(h.watcher.add_task(&task).unwrap_err(), WatchError::Stopped));
}

#[tokio::test]
async fn add_task_is_idempotent_and_remove_unregisters() {
    let h = harness(Duration::from_millis(100)).await;
    h.watcher.start().await.unwrap();

    let other = TempDir::new().unwrap();
    let task = Task::builder()
        .id("t2")
        .connection_id("c1")
        .source_path(other.path())
        .realtime(true)
        .build();
    h.watcher.add_task(&task).unwrap();
    h.watcher.add_task(&task).unwrap();
    assert_eq!(h.watcher.watched_tasks().len(), 2);

    h.watcher.remove_task(&task.id);
    assert_eq!(h.watcher.watched_tasks().len(), 1);

    // A task that is no longer realtime is deregistered on add.
    let mut downgraded = Task::builder()
        .id("t1")
        .connection_id("c1")
        .source_path(&h.source_path)
        .realtime(true)
        .build();
    downgraded.realtime = false;
    h.watcher.add_task(&downgraded).unwrap();
    assert!(h.watcher.watched_tasks().is_empty());
}

#[tokio::test]
async fn events_in_new_subdirectories_still_trigger() {
    let h = harness(Duration::from_millis(150)).await;
    h.watcher.start().await.unwrap();

    let sub = h.source_path.join("nested");
    fs::create_dir_all(&sub).unwrap();
    // The create itself debounces into one trigger.
    wait_for_triggers(&h.sink, 1).await;

    fs::write(sub.join("inside.txt"), b"data").unwrap();
    wait_for_triggers(&h.sink, 2).await;
}
