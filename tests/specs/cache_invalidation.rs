// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection updates invalidate the engine's cached fs handles.

use skiff_adapters::{CredentialCipher, FakeEngine, TransferEngine};
use skiff_core::{ConfigMap, SystemClock};
use skiff_daemon::{ConnectionService, NewConnection};
use skiff_storage::{ConnectionStore, Db, MigrationMode, TaskStore};
use std::sync::Arc;

#[tokio::test]
async fn next_resolve_after_update_rebuilds_the_handle() {
    let db = Db::connect_in_memory().await.unwrap();
    db.migrate(MigrationMode::Versioned).await.unwrap();
    let engine = Arc::new(FakeEngine::succeeding());
    let service = ConnectionService::new(
        ConnectionStore::new(db.clone()),
        TaskStore::new(db.clone()),
        CredentialCipher::new(None),
        engine.clone(),
        SystemClock,
    );

    let created = service
        .create(NewConnection {
            name: "c".to_string(),
            provider_type: "local".to_string(),
            config: ConfigMap::from([("root".to_string(), "/old".to_string())]),
        })
        .await
        .unwrap();

    // Warm the cache: one miss, then a hit on the same generation.
    let first = engine.resolve_fs("c", "docs").await.unwrap();
    let second = engine.resolve_fs("c", "docs").await.unwrap();
    assert_eq!(engine.resolve_misses(), 1);
    assert_eq!(engine.resolve_hits(), 1);
    assert_eq!(first.generation(), second.generation());

    service
        .update(
            &created.id,
            NewConnection {
                name: "c".to_string(),
                provider_type: "local".to_string(),
                config: ConfigMap::from([("root".to_string(), "/new".to_string())]),
            },
        )
        .await
        .unwrap();

    // The cached handle is gone; the next resolve builds a fresh one.
    let rebuilt = engine.resolve_fs("c", "docs").await.unwrap();
    assert_eq!(engine.resolve_misses(), 2);
    assert!(rebuilt.generation() > second.generation());
}
