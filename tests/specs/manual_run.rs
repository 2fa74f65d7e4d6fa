// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Manual run happy path: filtered upload against a local remote.

use skiff_core::{
    ConfigMap, EventFilter, JobStatus, LogAction, SyncDirection, TaskOptions, Trigger,
};
use skiff_daemon::{Config, Daemon, NewConnection, NewTask};
use std::time::Duration;
use tempfile::TempDir;

#[tokio::test]
async fn filtered_upload_copies_only_matching_files() {
    let data_dir = TempDir::new().unwrap();
    let remote_root = TempDir::new().unwrap();
    let source = TempDir::new().unwrap();
    std::fs::write(source.path().join("a.txt"), b"0123456789").unwrap();
    std::fs::write(source.path().join("b.tmp"), b"12345").unwrap();

    let mut config = Config::default();
    config.app.data_dir = data_dir.path().to_path_buf();
    let daemon = Daemon::start(config).await.unwrap();

    let connection = daemon
        .connections()
        .create(NewConnection {
            name: "remote-a".to_string(),
            provider_type: "local".to_string(),
            config: ConfigMap::from([(
                "root".to_string(),
                remote_root.path().to_string_lossy().into_owned(),
            )]),
        })
        .await
        .unwrap();
    let task = daemon
        .tasks()
        .create(NewTask {
            name: "docs".to_string(),
            source_path: source.path().to_path_buf(),
            connection_id: connection.id.clone(),
            remote_path: "docs".to_string(),
            direction: SyncDirection::Upload,
            schedule: String::new(),
            realtime: false,
            options: TaskOptions {
                filters: vec!["- *.tmp".into(), "+ **".into()],
                transfers: Some(4),
                ..TaskOptions::default()
            },
        })
        .await
        .unwrap();

    let mut sub = daemon.jobs().subscribe_progress(EventFilter::default());
    let job = daemon.jobs().start(&task.id, Trigger::Manual).await.unwrap();

    for _ in 0..500 {
        if !daemon.jobs().is_running(&task.id) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    // One job, RUNNING -> SUCCESS, with the filtered file's stats.
    let finished = daemon.jobs().get(&job.id).await.unwrap();
    assert_eq!(finished.status, JobStatus::Success);
    assert_eq!(finished.stats.files_transferred, 1);
    assert_eq!(finished.stats.bytes_transferred, 10);
    assert_eq!(finished.stats.files_deleted, 0);
    assert_eq!(finished.stats.error_count, 0);
    assert!(finished.end_time.is_some());

    // Exactly one log row: a.txt copied; nothing for b.tmp.
    let logs = daemon.jobs().logs(&job.id).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].path.as_deref(), Some("a.txt"));
    assert_eq!(logs[0].action, LogAction::Copied);
    assert_eq!(logs[0].size, Some(10));

    // The file landed; the excluded one did not.
    assert!(remote_root.path().join("docs/a.txt").exists());
    assert!(!remote_root.path().join("docs/b.tmp").exists());

    // At least one snapshot, the last carrying SUCCESS.
    let mut events = Vec::new();
    while let Some(event) = sub.try_recv() {
        events.push(event);
    }
    assert!(!events.is_empty());
    assert_eq!(events.last().unwrap().status, JobStatus::Success);

    daemon.stop().await;
}
