// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Refcounted recursive wrapper over the platform fs-notify primitive.
//!
//! The primitive watches single directories; this layer walks trees,
//! keeps a `directory → count` map so overlapping roots share watches,
//! grows into directories created under a watched root, and purges
//! descendants of removed or renamed ones. Directories whose basename
//! starts with `.` are ignored.

use super::WatchError;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event as FsEvent, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tracing::{debug, trace, warn};

pub struct RecursiveWatcher {
    watcher: Mutex<RecommendedWatcher>,
    counts: Mutex<HashMap<PathBuf, usize>>,
}

impl RecursiveWatcher {
    /// Returns the watcher plus its event and error streams.
    #[allow(clippy::type_complexity)]
    pub fn new(
    ) -> Result<(Self, UnboundedReceiver<FsEvent>, UnboundedReceiver<notify::Error>), WatchError>
    {
        let (tx, rx) = unbounded_channel();
        let (err_tx, err_rx) = unbounded_channel();
        let watcher = notify::recommended_watcher(
            move |result: Result<FsEvent, notify::Error>| match result {
                Ok(event) => {
                    let _ = tx.send(event);
                }
                Err(e) => {
                    let _ = err_tx.send(e);
                }
            },
        )?;
        Ok((
            Self { watcher: Mutex::new(watcher), counts: Mutex::new(HashMap::new()) },
            rx,
            err_rx,
        ))
    }

    /// Register `root` and every non-hidden directory below it.
    pub fn add(&self, root: &Path) -> Result<(), WatchError> {
        for dir in collect_dirs(root) {
            self.increment(&dir)?;
        }
        Ok(())
    }

    /// Decrement every registered directory under `root`, dropping the
    /// watch when a count reaches zero.
    pub fn remove(&self, root: &Path) {
        let mut counts = self.counts.lock();
        let affected: Vec<PathBuf> =
            counts.keys().filter(|dir| dir.starts_with(root)).cloned().collect();
        for dir in affected {
            if let Some(count) = counts.get_mut(&dir) {
                *count -= 1;
                if *count == 0 {
                    counts.remove(&dir);
                    if let Err(e) = self.watcher.lock().unwatch(&dir) {
                        trace!(dir = %dir.display(), error = %e, "unwatch failed");
                    }
                }
            }
        }
    }

    /// Keep the watch set in step with an incoming event: new directories
    /// under a watched root get registered, removed or renamed ones get
    /// purged together with their descendants.
    pub fn apply(&self, event: &FsEvent) {
        match event.kind {
            EventKind::Create(_) => {
                for path in &event.paths {
                    if path.is_dir() {
                        self.expand(path);
                    }
                }
            }
            EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                for path in &event.paths {
                    self.purge(path);
                }
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                if let [from, to] = event.paths.as_slice() {
                    self.purge(from);
                    if to.is_dir() {
                        self.expand(to);
                    }
                }
            }
            EventKind::Modify(ModifyKind::Name(_)) => {
                for path in &event.paths {
                    if path.is_dir() {
                        self.expand(path);
                    } else {
                        self.purge(path);
                    }
                }
            }
            _ => {}
        }
    }

    pub fn is_watched(&self, dir: &Path) -> bool {
        self.counts.lock().contains_key(dir)
    }

    pub fn count_for(&self, dir: &Path) -> usize {
        self.counts.lock().get(dir).copied().unwrap_or(0)
    }

    pub fn watched_dirs(&self) -> Vec<PathBuf> {
        self.counts.lock().keys().cloned().collect()
    }

    fn increment(&self, dir: &Path) -> Result<(), WatchError> {
        let mut counts = self.counts.lock();
        let count = counts.entry(dir.to_path_buf()).or_insert(0);
        *count += 1;
        if *count == 1 {
            if let Err(e) = self.watcher.lock().watch(dir, RecursiveMode::NonRecursive) {
                counts.remove(dir);
                return Err(e.into());
            }
            trace!(dir = %dir.display(), "watch added");
        }
        Ok(())
    }

    /// A directory appeared under a watched root: register its subtree,
    /// inheriting the covering root's count.
    fn expand(&self, dir: &Path) {
        if is_hidden(dir) {
            return;
        }
        let inherited = {
            let counts = self.counts.lock();
            dir.ancestors().skip(1).find_map(|ancestor| counts.get(ancestor).copied())
        };
        let Some(inherited) = inherited else {
            return;
        };
        debug!(dir = %dir.display(), "expanding watch into new directory");
        for sub in collect_dirs(dir) {
            let mut counts = self.counts.lock();
            let count = counts.entry(sub.clone()).or_insert(0);
            if *count == 0 {
                if let Err(e) = self.watcher.lock().watch(&sub, RecursiveMode::NonRecursive) {
                    warn!(dir = %sub.display(), error = %e, "watch failed during expansion");
                    counts.remove(&sub);
                    continue;
                }
            }
            if *count < inherited {
                *count = inherited;
            }
        }
    }

    /// A directory went away: drop it and everything below it.
    fn purge(&self, path: &Path) {
        let mut counts = self.counts.lock();
        let affected: Vec<PathBuf> =
            counts.keys().filter(|dir| dir.starts_with(path)).cloned().collect();
        for dir in affected {
            counts.remove(&dir);
            let _ = self.watcher.lock().unwatch(&dir);
            trace!(dir = %dir.display(), "watch purged");
        }
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// The root (always) plus every non-hidden directory below it.
fn collect_dirs(root: &Path) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if !root.is_dir() {
        return dirs;
    }
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        if let Ok(entries) = std::fs::read_dir(&dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() && !is_hidden(&path) {
                    pending.push(path);
                }
            }
        }
        dirs.push(dir);
    }
    dirs
}

#[cfg(test)]
#[path = "recursive_tests.rs"]
mod tests;
