// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local-filesystem transfer engine.
//!
//! Resolves `type = "local"` config sections rooted at the section's
//! `root` key. Comparison is by size; unchanged files are reported as
//! skipped rather than re-copied.

use super::config::ConfigRegistry;
use super::stats::StatsGroup;
use super::{BisyncOptions, CopyOptions, EngineError, FsHandle, TransferEngine};
use async_trait::async_trait;
use chrono::Utc;
use glob::Pattern;
use serde::{Deserialize, Serialize};
use skiff_core::{ConfigMap, ConflictResolution, FilterRule};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A transfer engine that moves files between local directories.
#[derive(Clone)]
pub struct LocalTransferEngine {
    registry: ConfigRegistry,
}

impl LocalTransferEngine {
    pub fn new(registry: ConfigRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ConfigRegistry {
        &self.registry
    }

    fn section_root(&self, remote: &str) -> Result<PathBuf, EngineError> {
        let section = self
            .registry
            .section(remote)
            .ok_or_else(|| EngineError::UnknownRemote(remote.to_string()))?;
        if section.get("type").map(String::as_str) != Some("local") {
            return Err(EngineError::Misconfigured(
                remote.to_string(),
                "provider type is not \"local\"".to_string(),
            ));
        }
        section
            .get("root")
            .map(PathBuf::from)
            .ok_or_else(|| {
                EngineError::Misconfigured(remote.to_string(), "missing \"root\" key".to_string())
            })
    }
}

#[async_trait]
impl TransferEngine for LocalTransferEngine {
    async fn resolve_fs(&self, remote: &str, path: &str) -> Result<FsHandle, EngineError> {
        if remote.is_empty() {
            // Direct local path, never cached.
            return Ok(FsHandle::new(path, path, 0));
        }
        let key = format!("{remote}:{path}");
        if let Some(handle) = self.registry.cached(&key) {
            return Ok(handle);
        }
        let root = self.section_root(remote)?;
        let resolved = if path.is_empty() { root } else { root.join(path) };
        let (handle, hit) = self.registry.cache_or_insert(&key, |generation| {
            FsHandle::new(&key, resolved, generation)
        });
        debug!(key, hit, generation = handle.generation(), "resolved fs handle");
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
        let filters = compile_filters(&options.filters)?;
        if !src.root().is_dir() {
            // Never treat a vanished source as "everything was deleted".
            return Err(EngineError::Failed(format!(
                "source directory does not exist: {}",
                src.root().display()
            )));
        }
        let files = walk(src.root(), &filters).await?;
        stats.set_totals(files.len() as u64, files.iter().map(|f| f.size).sum());

        let transfers = options.transfers.max(1) as usize;
        let mut inflight: JoinSet<bool> = JoinSet::new();
        let mut failed: u64 = 0;

        for file in &files {
            if cancel.is_cancelled() {
                inflight.abort_all();
                return Err(EngineError::Cancelled);
            }
            while inflight.len() >= transfers {
                if let Some(result) = inflight.join_next().await {
                    if !result.unwrap_or(false) {
                        failed += 1;
                    }
                }
            }
            let from = src.root().join(&file.rel);
            let to = dst.root().join(&file.rel);
            let rel = file.rel.clone();
            let size = file.size;
            let stats = stats.clone();
            inflight.spawn(async move { copy_one(&from, &to, &rel, size, &stats).await });
        }
        while let Some(result) = inflight.join_next().await {
            if !result.unwrap_or(false) {
                failed += 1;
            }
        }

        if options.delete_extraneous && !cancel.is_cancelled() {
            let kept: BTreeSet<&str> = files.iter().map(|f| f.rel.as_str()).collect();
            for extra in walk(dst.root(), &filters).await? {
                if cancel.is_cancelled() {
                    return Err(EngineError::Cancelled);
                }
                if kept.contains(extra.rel.as_str()) {
                    continue;
                }
                match tokio::fs::remove_file(dst.root().join(&extra.rel)).await {
                    Ok(()) => stats.record_deleted(&extra.rel, Utc::now()),
                    Err(e) => {
                        warn!(path = %extra.rel, error = %e, "failed to delete extraneous file");
                        stats.record_error(&extra.rel, Utc::now());
                        failed += 1;
                    }
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        if failed > 0 {
            return Err(EngineError::Failed(format!("{failed} file(s) failed to transfer")));
        }
        Ok(())
    }

    async fn run_bisync(
        &self,
        cancel: CancellationToken,
        first: &FsHandle,
        second: &FsHandle,
        workdir: &Path,
        options: &BisyncOptions,
        stats: &StatsGroup,
    ) -> Result<(), EngineError> {
        let filters = compile_filters(&options.filters)?;
        tokio::fs::create_dir_all(workdir).await?;
        tokio::fs::create_dir_all(first.root()).await?;
        tokio::fs::create_dir_all(second.root()).await?;
        let state_path = workdir.join("state.json");
        let previous = load_state(&state_path).await;

        let side_a: BTreeMap<String, FileMeta> =
            walk(first.root(), &filters).await?.into_iter().map(|f| (f.rel.clone(), f)).collect();
        let side_b: BTreeMap<String, FileMeta> =
            walk(second.root(), &filters).await?.into_iter().map(|f| (f.rel.clone(), f)).collect();

        let paths: BTreeSet<&String> = side_a.keys().chain(side_b.keys()).collect();
        stats.set_totals(paths.len() as u64, 0);

        let mut next_state = BTreeMap::new();
        for rel in paths {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            match (side_a.get(rel), side_b.get(rel)) {
                (Some(a), Some(b)) => {
                    if a.size != b.size {
                        let a_wins = winner_is_first(a, b, options.conflict_resolution);
                        let (from_root, to_root, size) = if a_wins {
                            (first.root(), second.root(), a.size)
                        } else {
                            (second.root(), first.root(), b.size)
                        };
                        if !copy_one(
                            &from_root.join(rel),
                            &to_root.join(rel),
                            rel,
                            size,
                            stats,
                        )
                        .await
                        {
                            continue;
                        }
                    }
                    next_state.insert(rel.clone(), SeenFile { size: a.size.max(b.size) });
                }
                (Some(a), None) => {
                    if previous.contains_key(rel) {
                        // Deleted on the second side; propagate.
                        tokio::fs::remove_file(first.root().join(rel)).await?;
                        stats.record_deleted(rel, Utc::now());
                    } else if copy_one(
                        &first.root().join(rel),
                        &second.root().join(rel),
                        rel,
                        a.size,
                        stats,
                    )
                    .await
                    {
                        next_state.insert(rel.clone(), SeenFile { size: a.size });
                    }
                }
                (None, Some(b)) => {
                    if previous.contains_key(rel) {
                        tokio::fs::remove_file(second.root().join(rel)).await?;
                        stats.record_deleted(rel, Utc::now());
                    } else if copy_one(
                        &second.root().join(rel),
                        &first.root().join(rel),
                        rel,
                        b.size,
                        stats,
                    )
                    .await
                    {
                        next_state.insert(rel.clone(), SeenFile { size: b.size });
                    }
                }
                (None, None) => {}
            }
        }

        save_state(&state_path, &next_state).await?;

        let errors = stats.snapshot().stats.error_count;
        if errors > 0 {
            return Err(EngineError::Failed(format!("{errors} file(s) failed to sync")));
        }
        Ok(())
    }
}

struct FileMeta {
    rel: String,
    size: u64,
    modified: SystemTime,
}

/// Copy one file, reporting through the stats group. Unchanged files (same
/// size at the destination) are recorded as skipped. Returns false on error.
async fn copy_one(from: &Path, to: &Path, rel: &str, size: u64, stats: &StatsGroup) -> bool {
    if let Ok(existing) = tokio::fs::metadata(to).await {
        if existing.is_file() && existing.len() == size {
            stats.record_skipped(rel, Utc::now());
            return true;
        }
    }
    stats.start_transfer(rel, size);
    if let Some(parent) = to.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            warn!(path = rel, error = %e, "failed to create destination directory");
            stats.record_error(rel, Utc::now());
            return false;
        }
    }
    match tokio::fs::copy(from, to).await {
        Ok(_) => {
            stats.finish_transfer(rel, size, Utc::now());
            true
        }
        Err(e) => {
            warn!(path = rel, error = %e, "copy failed");
            stats.record_error(rel, Utc::now());
            false
        }
    }
}

fn compile_filters(rules: &[FilterRule]) -> Result<Vec<(bool, Pattern)>, EngineError> {
    rules
        .iter()
        .map(|rule| {
            Pattern::new(rule.pattern())
                .map(|p| (rule.is_include(), p))
                .map_err(|source| EngineError::BadPattern { rule: rule.to_string(), source })
        })
        .collect()
}

/// First matching rule wins; unmatched paths are included.
fn included(rel: &str, filters: &[(bool, Pattern)]) -> bool {
    for (include, pattern) in filters {
        if pattern.matches(rel) {
            return *include;
        }
    }
    true
}

/// Recursively list files under `root`, filtered, as slash-separated
/// relative paths. A missing root yields an empty listing.
async fn walk(root: &Path, filters: &[(bool, Pattern)]) -> Result<Vec<FileMeta>, EngineError> {
    let mut files = Vec::new();
    if !root.exists() {
        return Ok(files);
    }
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let meta = entry.metadata().await?;
            if meta.is_dir() {
                pending.push(path);
                continue;
            }
            let rel = match path.strip_prefix(root) {
                Ok(r) => r.to_string_lossy().replace(std::path::MAIN_SEPARATOR, "/"),
                Err(_) => continue,
            };
            if included(&rel, filters) {
                files.push(FileMeta {
                    rel,
                    size: meta.len(),
                    modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                });
            }
        }
    }
    files.sort_by(|a, b| a.rel.cmp(&b.rel));
    Ok(files)
}

fn winner_is_first(a: &FileMeta, b: &FileMeta, resolution: ConflictResolution) -> bool {
    match resolution {
        ConflictResolution::Newer => a.modified >= b.modified,
        ConflictResolution::Larger => a.size >= b.size,
        ConflictResolution::Path1 => true,
        ConflictResolution::Path2 => false,
    }
}

#[derive(Serialize, Deserialize)]
struct SeenFile {
    size: u64,
}

async fn load_state(path: &Path) -> BTreeMap<String, SeenFile> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
        Err(_) => BTreeMap::new(),
    }
}

async fn save_state(
    path: &Path,
    state: &BTreeMap<String, SeenFile>,
) -> Result<(), EngineError> {
    let bytes = serde_json::to_vec(state).map_err(|e| EngineError::Failed(e.to_string()))?;
    tokio::fs::write(path, bytes).await?;
    Ok(())
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
