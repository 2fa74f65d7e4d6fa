// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use skiff_adapters::FakeEngine;
use skiff_core::{ConfigMap, EventFilter, SystemClock, TaskOptions, Trigger};
use skiff_storage::{ConnectionRecord, Db, MigrationMode, TaskStore};
use tempfile::TempDir;

struct Harness {
    _data_dir: TempDir,
    engine: Arc<FakeEngine>,
    jobs: JobStore,
    tasks: TaskStore,
    progress: ProgressBus,
    transfers: TransferBus,
    db: Db,
}

impl Harness {
    async fn new(engine: FakeEngine) -> Self {
        let db = Db::connect_in_memory().await.unwrap();
        db.migrate(MigrationMode::Versioned).await.unwrap();
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
            .unwrap();
        engine.set_section(
            "remote-a",
            ConfigMap::from([("type".to_string(), "local".to_string())]),
        );
        let tasks = TaskStore::new(db.clone());
        tasks.insert(&Task::builder().id("t1").connection_id("c1").build()).await.unwrap();
        Self {
            _data_dir: TempDir::new().unwrap(),
            engine: Arc::new(engine),
            jobs: JobStore::new(db.clone()),
            tasks,
            progress: ProgressBus::new(),
            transfers: TransferBus::new(),
            db,
        }
    }

    fn sync(&self, config_tweak: impl FnOnce(&mut SyncConfig)) -> SyncRunner<SystemClock> {
        let mut config = SyncConfig::new(self._data_dir.path());
        config.poll_interval = Duration::from_millis(10);
        config_tweak(&mut config);
        SyncRunner::new(
            self.engine.clone(),
            self.jobs.clone(),
            ConnectionStore::new(self.db.clone()),
            self.progress.clone(),
            self.transfers.clone(),
            SystemClock,
            config,
        )
    }

    async fn task(&self) -> Task {
        self.tasks.get(&"t1".into()).await.unwrap()
    }

    async fn new_job(&self) -> Job {
        self.jobs.create_job(&"t1".into(), Trigger::Manual, Utc::now()).await.unwrap()
    }
}

#[tokio::test]
async fn successful_run_finalizes_with_stats_and_logs() {
    let h = Harness::new(FakeEngine::with_transfers(vec![("a.txt".to_string(), 10)])).await;
    let sync = h.sync(|_| {});
    let mut sub = h.progress.subscribe(EventFilter::default());
    let task = h.task().await;
    let job = h.new_job().await;

    let status = sync.run_task(CancellationToken::new(), &task, &job).await.unwrap();
    assert_eq!(status, JobStatus::Success);

    let row = h.jobs.get(&job.id).await.unwrap();
    assert_eq!(row.status, JobStatus::Success);
    assert_eq!(row.stats.files_transferred, 1);
    assert_eq!(row.stats.bytes_transferred, 10);
    assert!(row.end_time.is_some());

    let logs = h.jobs.logs_for_job(&job.id).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].path.as_deref(), Some("a.txt"));
    assert_eq!(logs[0].action, LogAction::Copied);
    assert_eq!(logs[0].size, Some(10));

    // The terminal snapshot is the last event and carries SUCCESS.
    let mut last = None;
    while let Some(event) = sub.try_recv() {
        last = Some(event);
    }
    let last = last.expect("at least one progress snapshot");
    assert_eq!(last.status, JobStatus::Success);
    assert_eq!(last.files_transferred, 1);
    assert!(last.end_time.is_some());
}

#[tokio::test]
async fn engine_failure_finalizes_failed_with_errors() {
    let h = Harness::new(FakeEngine::failing("remote unreachable")).await;
    let sync = h.sync(|_| {});
    let task = h.task().await;
    let job = h.new_job().await;

    let status = sync.run_task(CancellationToken::new(), &task, &job).await.unwrap();
    assert_eq!(status, JobStatus::Failed);

    let row = h.jobs.get(&job.id).await.unwrap();
    assert_eq!(row.status, JobStatus::Failed);
    assert_eq!(row.errors.as_deref(), Some("remote unreachable"));
}

#[tokio::test]
async fn cancellation_finalizes_cancelled() {
    let (engine, release) = FakeEngine::blocking();
    let h = Harness::new(engine).await;
    let sync = Arc::new(h.sync(|_| {}));
    let task = h.task().await;
    let job = h.new_job().await;

    let cancel = CancellationToken::new();
    let run = tokio::spawn({
        let sync = Arc::clone(&sync);
        let cancel = cancel.clone();
        let (task, job) = (task.clone(), job.clone());
        async move { sync.run_task(cancel, &task, &job).await }
    });

    tokio::time::sleep(Duration::from_millis(30)).await;
    cancel.cancel();
    let status = run.await.unwrap().unwrap();
    assert_eq!(status, JobStatus::Cancelled);

    let row = h.jobs.get(&job.id).await.unwrap();
    assert_eq!(row.status, JobStatus::Cancelled);
    assert!(row.end_time.is_some());
    drop(release);
}

#[tokio::test]
async fn transfers_fall_back_task_then_config_then_default() {
    let h = Harness::new(FakeEngine::succeeding()).await;
    let task = h.task().await;

    // Engine default.
    let sync = h.sync(|_| {});
    let job = h.new_job().await;
    sync.run_task(CancellationToken::new(), &task, &job).await.unwrap();
    assert_eq!(h.engine.calls().last().unwrap().transfers, 4);

    // Global config.
    let sync = h.sync(|c| c.transfers = Some(8));
    let job = h.new_job().await;
    sync.run_task(CancellationToken::new(), &task, &job).await.unwrap();
    assert_eq!(h.engine.calls().last().unwrap().transfers, 8);

    // Task option wins.
    let mut task = task.clone();
    task.options = TaskOptions { transfers: Some(2), ..TaskOptions::default() };
    let job = h.new_job().await;
    sync.run_task(CancellationToken::new(), &task, &job).await.unwrap();
    assert_eq!(h.engine.calls().last().unwrap().transfers, 2);
}

#[tokio::test]
async fn direction_selects_paths_and_deletes() {
    let h = Harness::new(FakeEngine::succeeding()).await;
    let sync = h.sync(|_| {});

    let mut task = h.task().await;
    task.options = TaskOptions { no_delete: true, ..TaskOptions::default() };
    let job = h.new_job().await;
    sync.run_task(CancellationToken::new(), &task, &job).await.unwrap();
    let call = h.engine.calls().pop().unwrap();
    assert!(call.src.ends_with("/tmp/src"));
    assert_eq!(call.dst, "remote-a:backup");
    assert!(!call.delete_extraneous);
    assert!(!call.bidirectional);

    task.options = TaskOptions::default();
    task.direction = SyncDirection::Download;
    let job = h.new_job().await;
    sync.run_task(CancellationToken::new(), &task, &job).await.unwrap();
    let call = h.engine.calls().pop().unwrap();
    assert_eq!(call.src, "remote-a:backup");
    assert!(call.delete_extraneous);

    task.direction = SyncDirection::Bidirectional;
    let job = h.new_job().await;
    sync.run_task(CancellationToken::new(), &task, &job).await.unwrap();
    let call = h.engine.calls().pop().unwrap();
    assert!(call.bidirectional);
}

#[tokio::test]
async fn auto_delete_prunes_empty_successful_jobs() {
    let h = Harness::new(FakeEngine::succeeding()).await;
    let sync = h.sync(|c| c.auto_delete_empty_jobs = true);
    let mut sub = h.progress.subscribe(EventFilter::default());
    let task = h.task().await;
    let job = h.new_job().await;

    let status = sync.run_task(CancellationToken::new(), &task, &job).await.unwrap();
    assert_eq!(status, JobStatus::Success);

    // Subscribers saw the terminal snapshot even though the row is gone.
    let mut last = None;
    while let Some(event) = sub.try_recv() {
        last = Some(event);
    }
    assert_eq!(last.unwrap().status, JobStatus::Success);
    assert!(h.jobs.get_optional(&job.id).await.unwrap().is_none());
}

#[tokio::test]
async fn non_empty_successful_jobs_survive_auto_delete() {
    let h = Harness::new(FakeEngine::with_transfers(vec![("a.txt".to_string(), 1)])).await;
    let sync = h.sync(|c| c.auto_delete_empty_jobs = true);
    let task = h.task().await;
    let job = h.new_job().await;
    sync.run_task(CancellationToken::new(), &task, &job).await.unwrap();
    assert!(h.jobs.get_optional(&job.id).await.unwrap().is_some());
}

#[tokio::test]
async fn preflight_rejects_bad_rules_and_range() {
    let h = Harness::new(FakeEngine::succeeding()).await;
    let sync = h.sync(|_| {});

    let mut task = h.task().await;
    task.options = TaskOptions { filters: vec!["bogus".into()], ..TaskOptions::default() };
    assert_eq!(sync.preflight(&task).unwrap_err().kind(), ErrorKind::Validation);

    task.options = TaskOptions { transfers: Some(0), ..TaskOptions::default() };
    assert_eq!(sync.preflight(&task).unwrap_err().kind(), ErrorKind::Validation);

    task.options = TaskOptions { filters: vec!["- [".into()], ..TaskOptions::default() };
    assert_eq!(sync.preflight(&task).unwrap_err().kind(), ErrorKind::Validation);

    task.options = TaskOptions::default();
    sync.preflight(&task).unwrap();
}

#[tokio::test]
async fn missing_connection_is_an_error_before_the_engine_runs() {
    let h = Harness::new(FakeEngine::succeeding()).await;
    let sync = h.sync(|_| {});
    let mut task = h.task().await;
    task.connection_id = "ghost".into();
    let job = h.new_job().await;

    let err = sync.run_task(CancellationToken::new(), &task, &job).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(h.engine.calls().is_empty());
}

#[tokio::test]
async fn progress_is_monotone_per_job() {
    let h = Harness::new(FakeEngine::with_transfers(vec![
        ("a".to_string(), 1),
        ("b".to_string(), 2),
        ("c".to_string(), 3),
    ]))
    .await;
    let sync = h.sync(|_| {});
    let mut sub = h.progress.subscribe(EventFilter::default());
    let task = h.task().await;
    let job = h.new_job().await;
    sync.run_task(CancellationToken::new(), &task, &job).await.unwrap();

    let mut events = Vec::new();
    while let Some(event) = sub.try_recv() {
        events.push(event);
    }
    assert!(!events.is_empty());
    assert!(events.windows(2).all(|w| {
        w[1].files_transferred >= w[0].files_transferred
            && w[1].bytes_transferred >= w[0].bytes_transferred
    }));
    assert_eq!(events.last().unwrap().status, JobStatus::Success);
}
