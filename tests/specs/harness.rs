// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared rig: in-memory store, scripted engine, live runner.

use chrono::Utc;
use skiff_adapters::{FakeEngine, ReleaseHandle, TransferEngine};
use skiff_core::{ConfigMap, SystemClock, Task, TaskId};
use skiff_engine::{ProgressBus, Runner, SyncConfig, SyncRunner, TransferBus};
use skiff_storage::{ConnectionRecord, ConnectionStore, Db, JobStore, MigrationMode, TaskStore};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub struct Rig {
    pub _data_dir: TempDir,
    pub engine: Arc<FakeEngine>,
    pub jobs: JobStore,
    pub tasks: TaskStore,
    pub progress: ProgressBus,
    pub runner: Arc<Runner<SystemClock>>,
    pub release: Option<ReleaseHandle>,
}

pub async fn rig(engine: FakeEngine, release: Option<ReleaseHandle>) -> Rig {
    let db = Db::connect_in_memory().await.expect("open db");
    db.migrate(MigrationMode::Versioned).await.expect("migrate");

    let connections = ConnectionStore::new(db.clone());
    connections
        .insert(&ConnectionRecord {
            id: "c1".into(),
            name: "remote-a".to_string(),
            provider_type: "local".to_string(),
            encrypted_config: b"{}".to_vec(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
        .await
        .expect("seed connection");
    engine.set_section("remote-a", ConfigMap::from([("type".to_string(), "local".to_string())]));

    let tasks = TaskStore::new(db.clone());
    tasks
        .insert(&Task::builder().id("t1").connection_id("c1").build())
        .await
        .expect("seed task");

    let jobs = JobStore::new(db.clone());
    let data_dir = TempDir::new().expect("tempdir");
    let mut sync_config = SyncConfig::new(data_dir.path());
    sync_config.poll_interval = Duration::from_millis(10);

    let engine = Arc::new(engine);
    let progress = ProgressBus::new();
    let sync = Arc::new(SyncRunner::new(
        engine.clone(),
        jobs.clone(),
        connections,
        progress.clone(),
        TransferBus::new(),
        SystemClock,
        sync_config,
    ));
    let runner = Arc::new(Runner::new(
        sync,
        jobs.clone(),
        progress.clone(),
        SystemClock,
        Duration::from_secs(5),
    ));

    Rig { _data_dir: data_dir, engine, jobs, tasks, progress, runner, release }
}

pub async fn wait_idle(runner: &Arc<Runner<SystemClock>>, task_id: &TaskId) {
    for _ in 0..500 {
        if !runner.is_running(task_id) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("task {task_id} never finished");
}
