// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide connection-config registry with fs-handle cache.
//!
//! One mutex guards both the named sections and the handle cache so a
//! section write and the invalidation of its cached handles are a single
//! critical section. No lock is held across engine I/O.

use super::FsHandle;
use parking_lot::Mutex;
use skiff_core::ConfigMap;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct RegistryState {
    sections: HashMap<String, ConfigMap>,
    cache: HashMap<String, FsHandle>,
    /// Monotone counter stamped onto freshly built handles.
    generation: u64,
}

/// Shared between an engine implementation and the service layer that
/// mirrors connection configs into it.
#[derive(Clone, Default)]
pub struct ConfigRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl ConfigRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or replace a section, dropping cached handles for the name.
    pub fn set_section(&self, name: &str, config: ConfigMap) {
        let mut state = self.state.lock();
        state.sections.insert(name.to_string(), config);
        drop_cached(&mut state, name);
    }

    /// Remove a section, dropping cached handles for the name.
    pub fn delete_section(&self, name: &str) {
        let mut state = self.state.lock();
        state.sections.remove(name);
        drop_cached(&mut state, name);
    }

    pub fn section(&self, name: &str) -> Option<ConfigMap> {
        self.state.lock().sections.get(name).cloned()
    }

    /// Drop cached handles prefixed by `name:`.
    pub fn invalidate(&self, name: &str) {
        drop_cached(&mut self.state.lock(), name);
    }

    pub fn cached(&self, key: &str) -> Option<FsHandle> {
        self.state.lock().cache.get(key).cloned()
    }

    /// Build-and-cache: returns the cached handle for `key` or stores the
    /// one produced by `build`, stamped with a fresh generation.
    pub fn cache_or_insert(
        &self,
        key: &str,
        build: impl FnOnce(u64) -> FsHandle,
    ) -> (FsHandle, bool) {
        let mut state = self.state.lock();
        if let Some(handle) = state.cache.get(key) {
            return (handle.clone(), true);
        }
        state.generation += 1;
        let handle = build(state.generation);
        state.cache.insert(key.to_string(), handle.clone());
        (handle, false)
    }

    /// Number of live cache entries, for tests and introspection.
    pub fn cached_handles(&self) -> usize {
        self.state.lock().cache.len()
    }
}

fn drop_cached(state: &mut RegistryState, name: &str) {
    let prefix = format!("{name}:");
    state.cache.retain(|key, _| !key.starts_with(&prefix));
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
