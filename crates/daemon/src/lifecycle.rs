// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: assemble, run, tear down in order.

use crate::config::{Config, ConfigError};
use crate::services::{ConnectionService, JobService, ServiceError, TaskService};
use skiff_adapters::{ConfigRegistry, CredentialCipher, LocalTransferEngine};
use skiff_core::SystemClock;
use skiff_engine::{
    LogCleanup, ProgressBus, Runner, Scheduler, SchedulerError, SyncConfig, SyncRunner,
    TransferBus, WatchError, Watcher,
};
use skiff_storage::{ConnectionStore, Db, JobStore, StorageError, TaskStore};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// How long `stop` waits for in-flight jobs before failing them.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("cannot prepare data dir: {0}")]
    DataDir(#[from] std::io::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error(transparent)]
    Watch(#[from] WatchError),
}

/// One assembled process: database, engine, runner, trigger sources, and
/// the service façades the API layer talks to.
pub struct Daemon {
    config: Config,
    db: Db,
    runner: Arc<Runner<SystemClock>>,
    scheduler: Arc<Scheduler>,
    watcher: Arc<Watcher>,
    cleanup: Option<Arc<LogCleanup>>,
    connections: ConnectionService<SystemClock>,
    tasks: TaskService<SystemClock>,
    jobs: JobService<SystemClock>,
}

impl Daemon {
    pub async fn start(config: Config) -> Result<Self, DaemonError> {
        std::fs::create_dir_all(&config.app.data_dir)?;

        let db = Db::connect(&config.database_path()).await?;
        db.migrate(config.migration_mode()?).await?;

        let connection_store = ConnectionStore::new(db.clone());
        let task_store = TaskStore::new(db.clone());
        let job_store = JobStore::new(db.clone());

        let cipher = CredentialCipher::new(Some(&config.security.encryption_key));
        let engine = Arc::new(LocalTransferEngine::new(ConfigRegistry::new()));
        let progress = ProgressBus::new();
        let transfers = TransferBus::new();

        let mut sync_config = SyncConfig::new(&config.app.data_dir);
        sync_config.transfers = config.app.sync.transfers;
        sync_config.auto_delete_empty_jobs = config.app.job.auto_delete_empty_jobs;
        let sync = Arc::new(SyncRunner::new(
            engine.clone(),
            job_store.clone(),
            connection_store.clone(),
            progress.clone(),
            transfers.clone(),
            SystemClock,
            sync_config,
        ));
        let runner = Arc::new(Runner::new(
            sync,
            job_store.clone(),
            progress.clone(),
            SystemClock,
            SHUTDOWN_GRACE,
        ));
        // Crash recovery before anything can trigger.
        runner.start().await;

        let connections = ConnectionService::new(
            connection_store.clone(),
            task_store.clone(),
            cipher,
            engine.clone(),
            SystemClock,
        );
        connections.load_sections().await?;

        let scheduler = Arc::new(Scheduler::new(runner.clone(), task_store.clone()));
        scheduler.start().await?;

        let watcher = Arc::new(Watcher::new(runner.clone(), task_store.clone())?);
        watcher.start().await?;

        let cleanup = LogCleanup::new(
            job_store.clone(),
            connection_store.clone(),
            config.app.job.max_logs_per_connection,
            &config.app.job.cleanup_schedule,
        )?;
        if let Some(cleanup) = &cleanup {
            cleanup.start();
        }

        let tasks = TaskService::new(
            task_store.clone(),
            connection_store,
            engine,
            runner.clone(),
            scheduler.clone(),
            watcher.clone(),
            SystemClock,
        );
        let jobs = JobService::new(
            job_store,
            task_store,
            runner.clone(),
            progress,
            transfers,
            SystemClock,
        );

        info!(
            environment = %config.app.environment,
            data_dir = %config.app.data_dir.display(),
            "daemon started"
        );
        Ok(Self { config, db, runner, scheduler, watcher, cleanup, connections, tasks, jobs })
    }

    /// Ordered shutdown: trigger sources first, then the runner (which
    /// waits on in-flight jobs), then the database.
    pub async fn stop(&self) {
        self.watcher.stop();
        self.scheduler.stop();
        if let Some(cleanup) = &self.cleanup {
            cleanup.stop();
        }
        self.runner.stop().await;
        self.db.close().await;
        info!("daemon stopped");
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn connections(&self) -> &ConnectionService<SystemClock> {
        &self.connections
    }

    pub fn tasks(&self) -> &TaskService<SystemClock> {
        &self.tasks
    }

    pub fn jobs(&self) -> &JobService<SystemClock> {
        &self.jobs
    }

    pub fn runner(&self) -> &Arc<Runner<SystemClock>> {
        &self.runner
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
