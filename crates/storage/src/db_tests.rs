// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn versioned_migration_creates_tables() {
    let db = Db::connect_in_memory().await.unwrap();
    db.migrate(MigrationMode::Versioned).await.unwrap();

    let tables: Vec<(String,)> = sqlx::query_as(
        "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
    )
    .fetch_all(db.pool())
    .await
    .unwrap();
    let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
    for expected in ["connections", "tasks", "jobs", "job_logs"] {
        assert!(names.contains(&expected), "missing table {expected}: {names:?}");
    }
}

#[tokio::test]
async fn auto_migration_is_idempotent() {
    let db = Db::connect_in_memory().await.unwrap();
    db.migrate(MigrationMode::Auto).await.unwrap();
    db.migrate(MigrationMode::Auto).await.unwrap();

    let count: (i64,) =
        sqlx::query_as("SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = 'jobs'")
            .fetch_one(db.pool())
            .await
            .unwrap();
    assert_eq!(count.0, 1);
}

#[tokio::test]
async fn file_database_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("skiff.db");
    let db = Db::connect(&path).await.unwrap();
    db.migrate(MigrationMode::Versioned).await.unwrap();
    db.close().await;

    let db = Db::connect(&path).await.unwrap();
    // Second run is a no-op thanks to the migration table.
    db.migrate(MigrationMode::Versioned).await.unwrap();
    db.close().await;
}

#[test]
fn migration_mode_parses() {
    assert_eq!("versioned".parse::<MigrationMode>().unwrap(), MigrationMode::Versioned);
    assert_eq!("auto".parse::<MigrationMode>().unwrap(), MigrationMode::Auto);
    assert!("other".parse::<MigrationMode>().is_err());
}
