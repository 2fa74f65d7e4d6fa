// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted engine for orchestrator tests.

#![cfg(any(test, feature = "test-support"))]

use super::config::ConfigRegistry;
use super::stats::StatsGroup;
use super::{BisyncOptions, CopyOptions, EngineError, FsHandle, TransferEngine};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use skiff_core::ConfigMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// What the next invocation should do.
#[derive(Debug, Clone)]
pub enum FakeBehavior {
    /// Complete immediately after scripting `(path, size)` transfers.
    Succeed { transfers: Vec<(String, u64)> },
    /// Fail with the message.
    Fail(String),
    /// Park until released or cancelled.
    Block,
    /// Park until released, ignoring cancellation (a hung engine call).
    Hang,
}

/// Wakes a [`FakeBehavior::Block`]ed invocation.
#[derive(Clone)]
pub struct ReleaseHandle(Arc<Notify>);

impl ReleaseHandle {
    pub fn release(&self) {
        self.0.notify_one();
    }
}

/// One recorded `run_copy` / `run_bisync` invocation.
#[derive(Debug, Clone)]
pub struct CopyCall {
    pub src: String,
    pub dst: String,
    pub src_generation: u64,
    pub transfers: u32,
    pub delete_extraneous: bool,
    pub bidirectional: bool,
}

/// A transfer engine whose outcomes are scripted by the test.
pub struct FakeEngine {
    registry: ConfigRegistry,
    behavior: Mutex<FakeBehavior>,
    release: Arc<Notify>,
    calls: Mutex<Vec<CopyCall>>,
    resolve_hits: AtomicU64,
    resolve_misses: AtomicU64,
}

impl FakeEngine {
    fn with_behavior(behavior: FakeBehavior) -> Self {
        Self {
            registry: ConfigRegistry::new(),
            behavior: Mutex::new(behavior),
            release: Arc::new(Notify::new()),
            calls: Mutex::new(Vec::new()),
            resolve_hits: AtomicU64::new(0),
            resolve_misses: AtomicU64::new(0),
        }
    }

    /// Succeeds immediately with no transfers.
    pub fn succeeding() -> Self {
        Self::with_behavior(FakeBehavior::Succeed { transfers: Vec::new() })
    }

    /// Succeeds immediately, scripting the given `(path, size)` transfers.
    pub fn with_transfers(transfers: Vec<(String, u64)>) -> Self {
        Self::with_behavior(FakeBehavior::Succeed { transfers })
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_behavior(FakeBehavior::Fail(message.into()))
    }

    /// Parks every invocation until the handle is released (or the run is
    /// cancelled).
    pub fn blocking() -> (Self, ReleaseHandle) {
        let engine = Self::with_behavior(FakeBehavior::Block);
        let handle = ReleaseHandle(Arc::clone(&engine.release));
        (engine, handle)
    }

    /// Like [`FakeEngine::blocking`] but deaf to cancellation, simulating
    /// an engine call hung past any grace period.
    pub fn hanging() -> (Self, ReleaseHandle) {
        let engine = Self::with_behavior(FakeBehavior::Hang);
        let handle = ReleaseHandle(Arc::clone(&engine.release));
        (engine, handle)
    }

    pub fn set_behavior(&self, behavior: FakeBehavior) {
        *self.behavior.lock() = behavior;
    }

    pub fn registry(&self) -> &ConfigRegistry {
        &self.registry
    }

    pub fn calls(&self) -> Vec<CopyCall> {
        self.calls.lock().clone()
    }

    pub fn resolve_hits(&self) -> u64 {
        self.resolve_hits.load(Ordering::Relaxed)
    }

    pub fn resolve_misses(&self) -> u64 {
        self.resolve_misses.load(Ordering::Relaxed)
    }

    async fn run(
        &self,
        cancel: CancellationToken,
        stats: &StatsGroup,
    ) -> Result<(), EngineError> {
        let behavior = self.behavior.lock().clone();
        match behavior {
            FakeBehavior::Succeed { transfers } => {
                let total_files = transfers.len() as u64;
                let total_bytes = transfers.iter().map(|(_, s)| s).sum();
                stats.set_totals(total_files, total_bytes);
                for (path, size) in transfers {
                    stats.start_transfer(&path, size);
                    stats.finish_transfer(&path, size, Utc::now());
                }
                Ok(())
            }
            FakeBehavior::Fail(message) => Err(EngineError::Failed(message)),
            FakeBehavior::Block => {
                tokio::select! {
                    _ = cancel.cancelled() => Err(EngineError::Cancelled),
                    _ = self.release.notified() => Ok(()),
                }
            }
            FakeBehavior::Hang => {
                self.release.notified().await;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl TransferEngine for FakeEngine {
    async fn resolve_fs(&self, remote: &str, path: &str) -> Result<FsHandle, EngineError> {
        if remote.is_empty() {
            return Ok(FsHandle::new(path, path, 0));
        }
        if self.registry.section(remote).is_none() {
            return Err(EngineError::UnknownRemote(remote.to_string()));
        }
        let key = format!("{remote}:{path}");
        if let Some(handle) = self.registry.cached(&key) {
            self.resolve_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(handle);
        }
        self.resolve_misses.fetch_add(1, Ordering::Relaxed);
        let root = format!("/fake/{remote}/{path}");
        let (handle, _) =
            self.registry.cache_or_insert(&key, |g| FsHandle::new(&key, &root, g));
        Ok(handle)
    }

    fn invalidate_fs(&self, remote: &str) {
        self.registry.invalidate(remote);
    }

    fn set_section(&self, name: &str, config: ConfigMap) {
        self.registry.set_section(name, config);
    }

    fn delete_section(&self, name: &str) {
        self.registry.delete_section(name);
    }

    fn validate_filter_rule(&self, rule: &str) -> Result<(), EngineError> {
        super::validate_rule(rule)
    }

    async fn run_copy(
        &self,
        cancel: CancellationToken,
        src: &FsHandle,
        dst: &FsHandle,
        options: &CopyOptions,
        stats: &StatsGroup,
    ) -> Result<(), EngineError> {
        self.calls.lock().push(CopyCall {
            src: src.key().to_string(),
            dst: dst.key().to_string(),
            src_generation: src.generation(),
            transfers: options.transfers,
            delete_extraneous: options.delete_extraneous,
            bidirectional: false,
        });
        self.run(cancel, stats).await
    }

    async fn run_bisync(
        &self,
        cancel: CancellationToken,
        first: &FsHandle,
        second: &FsHandle,
        _workdir: &Path,
        options: &BisyncOptions,
        stats: &StatsGroup,
    ) -> Result<(), EngineError> {
        self.calls.lock().push(CopyCall {
            src: first.key().to_string(),
            dst: second.key().to_string(),
            src_generation: first.generation(),
            transfers: options.transfers,
            delete_extraneous: false,
            bidirectional: true,
        });
        self.run(cancel, stats).await
    }
}
