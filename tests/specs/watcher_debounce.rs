// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A burst of writes under a realtime task collapses into one trigger.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use skiff_core::{Task, TaskId, Trigger};
use skiff_engine::{TriggerSink, Watcher};
use skiff_storage::{ConnectionRecord, ConnectionStore, Db, MigrationMode, TaskStore};
use std::sync::Arc;
use std::time::Duration;
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

#[tokio::test]
async fn burst_yields_exactly_one_realtime_trigger() {
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
    let watcher = Watcher::with_debounce(sink.clone(), tasks, Duration::from_millis(400)).unwrap();
    watcher.start().await.unwrap();

    // Five writes, each well inside the debounce window of the previous.
    for revision in 0..5 {
        std::fs::write(source.path().join("x"), format!("rev {revision}")).unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
    }

    // One trigger fires roughly a window after the last write...
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    loop {
        if !sink.triggers.lock().is_empty() {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "debounce never fired");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    // ...and stays the only one.
    tokio::time::sleep(Duration::from_millis(800)).await;
    let triggers = sink.triggers.lock().clone();
    assert_eq!(triggers.len(), 1);
    assert_eq!(triggers[0], (TaskId::from("t1"), Trigger::Realtime));

    watcher.stop();
}
