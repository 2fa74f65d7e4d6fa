// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem trigger source.
//!
//! Watches the source path of every `realtime` task through the
//! refcounted [`recursive::RecursiveWatcher`] and collapses event bursts
//! into one trigger per task with a per-task debounce timer. Start/stop
//! are idempotent; a stopped watcher cannot be restarted.

pub mod recursive;

use crate::runner::TriggerSink;
use notify::event::ModifyKind;
use notify::{Event as FsEvent, EventKind};
use parking_lot::Mutex;
use recursive::RecursiveWatcher;
use skiff_core::{Task, TaskId, Trigger};
use skiff_storage::TaskStore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

/// Window in which further events for a task reset its pending trigger.
const DEBOUNCE_WINDOW: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("fs watch failed: {0}")]
    Notify(#[from] notify::Error),
    #[error("watcher is stopped")]
    Stopped,
}

impl skiff_core::Classify for WatchError {
    fn kind(&self) -> skiff_core::ErrorKind {
        match self {
            WatchError::Notify(_) => skiff_core::ErrorKind::External,
            WatchError::Stopped => skiff_core::ErrorKind::Conflict,
        }
    }
}

type EventStreams = (UnboundedReceiver<FsEvent>, UnboundedReceiver<notify::Error>);

/// The outward-facing watcher.
pub struct Watcher {
    inner: Arc<Inner>,
    streams: Mutex<Option<EventStreams>>,
    loops: Mutex<Vec<AbortHandle>>,
    started: AtomicBool,
    stopped: AtomicBool,
}

struct Inner {
    recursive: RecursiveWatcher,
    sink: Arc<dyn TriggerSink>,
    tasks: TaskStore,
    registered: Mutex<HashMap<TaskId, Task>>,
    debounce: Mutex<HashMap<TaskId, AbortHandle>>,
    window: Duration,
}

impl Watcher {
    pub fn new(sink: Arc<dyn TriggerSink>, tasks: TaskStore) -> Result<Self, WatchError> {
        Self::with_debounce(sink, tasks, DEBOUNCE_WINDOW)
    }

    /// Same as [`Watcher::new`] with an explicit debounce window.
    pub fn with_debounce(
        sink: Arc<dyn TriggerSink>,
        tasks: TaskStore,
        window: Duration,
    ) -> Result<Self, WatchError> {
        let (recursive, events, errors) = RecursiveWatcher::new()?;
        Ok(Self {
            inner: Arc::new(Inner {
                recursive,
                sink,
                tasks,
                registered: Mutex::new(HashMap::new()),
                debounce: Mutex::new(HashMap::new()),
                window,
            }),
            streams: Mutex::new(Some((events, errors))),
            loops: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        })
    }

    /// Register every realtime task and begin consuming events.
    /// Idempotent; fails once stopped.
    pub async fn start(&self) -> Result<(), WatchError> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(WatchError::Stopped);
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        match self.inner.tasks.list_realtime().await {
            Ok(tasks) => {
                for task in tasks {
                    if let Err(e) = self.inner.add_task(&task) {
                        warn!(task_id = %task.id, error = %e, "failed to watch task source");
                    }
                }
            }
            Err(e) => warn!(error = %e, "failed to load realtime tasks"),
        }

        let Some((mut events, mut errors)) = self.streams.lock().take() else {
            return Err(WatchError::Stopped);
        };

        let inner = Arc::clone(&self.inner);
        let event_loop = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                Inner::on_event(&inner, event);
            }
        })
        .abort_handle();
        let error_loop = tokio::spawn(async move {
            while let Some(error) = errors.recv().await {
                warn!(%error, "fs watch error");
            }
        })
        .abort_handle();
        self.loops.lock().extend([event_loop, error_loop]);
        info!("watcher started");
        Ok(())
    }

    /// Register a task (replacing any previous registration); a task that
    /// is no longer realtime is deregistered.
    pub fn add_task(&self, task: &Task) -> Result<(), WatchError> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(WatchError::Stopped);
        }
        self.inner.add_task(task)
    }

    pub fn remove_task(&self, task_id: &TaskId) {
        self.inner.remove_task(task_id);
    }

    /// Idempotent. A stopped watcher stays stopped; build a new instance
    /// to watch again.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        for handle in self.loops.lock().drain(..) {
            handle.abort();
        }
        let mut debounce = self.inner.debounce.lock();
        for (_, handle) in debounce.drain() {
            handle.abort();
        }
        info!("watcher stopped");
    }

    /// Registered watch roots, for introspection.
    pub fn watched_tasks(&self) -> Vec<TaskId> {
        self.inner.registered.lock().keys().cloned().collect()
    }
}

impl Inner {
    fn add_task(&self, task: &Task) -> Result<(), WatchError> {
        if !task.realtime {
            self.remove_task(&task.id);
            return Ok(());
        }
        {
            let mut registered = self.registered.lock();
            if let Some(previous) = registered.remove(&task.id) {
                self.recursive.remove(&previous.source_path);
            }
        }
        self.recursive.add(&task.source_path)?;
        self.registered.lock().insert(task.id.clone(), task.clone());
        debug!(task_id = %task.id, path = %task.source_path.display(), "task watched");
        Ok(())
    }

    fn remove_task(&self, task_id: &TaskId) {
        if let Some(task) = self.registered.lock().remove(task_id) {
            self.recursive.remove(&task.source_path);
            debug!(%task_id, "task unwatched");
        }
        if let Some(handle) = self.debounce.lock().remove(task_id) {
            handle.abort();
        }
    }

    fn on_event(inner: &Arc<Self>, event: FsEvent) {
        // Permission/metadata churn and reads are not sync triggers.
        if matches!(
            event.kind,
            EventKind::Access(_) | EventKind::Modify(ModifyKind::Metadata(_))
        ) {
            return;
        }
        inner.recursive.apply(&event);

        let matched: Vec<Task> = {
            let registered = inner.registered.lock();
            registered
                .values()
                .filter(|task| {
                    event.paths.iter().any(|path| path.starts_with(&task.source_path))
                })
                .cloned()
                .collect()
        };
        for task in matched {
            Self::schedule_trigger(inner, task);
        }
    }

    /// (Re)arm the task's debounce timer.
    fn schedule_trigger(inner: &Arc<Self>, task: Task) {
        let mut debounce = inner.debounce.lock();
        if let Some(previous) = debounce.remove(&task.id) {
            previous.abort();
        }
        let inner = Arc::clone(inner);
        let task_id = task.id.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(inner.window).await;
            inner.debounce.lock().remove(&task.id);
            debug!(task_id = %task.id, "debounce fired");
            inner.sink.trigger(task, Trigger::Realtime).await;
        })
        .abort_handle();
        debounce.insert(task_id, handle);
    }
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;
