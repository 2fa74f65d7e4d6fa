// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process pub/sub for progress events.
//!
//! Two independent instances run in the daemon: job-level progress and
//! per-file transfer activity. Publishing never blocks: a subscriber whose
//! channel is full loses that event (counted), everyone else is
//! unaffected. Delivery order per subscriber equals publish order. No
//! persistence; late subscribers see only what is published after they
//! join.

use parking_lot::Mutex;
use skiff_core::{EventFilter, JobProgress, Scoped, TransferActivity};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;

/// Default per-subscriber channel capacity.
const CHANNEL_CAPACITY: usize = 64;

pub type ProgressBus = Bus<JobProgress>;
pub type TransferBus = Bus<TransferActivity>;

struct Entry<T> {
    filter: EventFilter,
    tx: mpsc::Sender<T>,
}

struct Shared<T> {
    subscribers: Mutex<HashMap<u64, Entry<T>>>,
    next_id: AtomicU64,
    overflow: AtomicU64,
    capacity: usize,
}

/// A fan-out bus for one event type.
pub struct Bus<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Bus<T> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

impl<T: Scoped + Clone + Send + 'static> Bus<T> {
    pub fn new() -> Self {
        Self::with_capacity(CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                subscribers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                overflow: AtomicU64::new(0),
                capacity,
            }),
        }
    }

    /// Register a subscriber. Dropping the subscription unsubscribes.
    pub fn subscribe(&self, filter: EventFilter) -> Subscription<T> {
        let (tx, rx) = mpsc::channel(self.shared.capacity);
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        self.shared.subscribers.lock().insert(id, Entry { filter, tx });
        Subscription { id, rx, shared: Arc::downgrade(&self.shared) }
    }

    /// Remove a subscriber, closing its channel. Idempotent.
    pub fn unsubscribe(&self, id: u64) {
        self.shared.subscribers.lock().remove(&id);
    }

    /// Fan an event out to every matching subscriber without blocking.
    pub fn publish(&self, event: T) {
        let mut dead = Vec::new();
        {
            let subscribers = self.shared.subscribers.lock();
            for (id, entry) in subscribers.iter() {
                if !entry.filter.matches(&event) {
                    continue;
                }
                match entry.tx.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        self.shared.overflow.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => dead.push(*id),
                }
            }
        }
        if !dead.is_empty() {
            let mut subscribers = self.shared.subscribers.lock();
            for id in dead {
                subscribers.remove(&id);
            }
        }
    }

    /// Events dropped because a subscriber's channel was full.
    pub fn overflow_count(&self) -> u64 {
        self.shared.overflow.load(Ordering::Relaxed)
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.lock().len()
    }
}

impl<T: Scoped + Clone + Send + 'static> Default for Bus<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A live subscription; receive with [`Subscription::recv`].
pub struct Subscription<T> {
    id: u64,
    rx: mpsc::Receiver<T>,
    shared: Weak<Shared<T>>,
}

impl<T> Subscription<T> {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next event, or `None` once unsubscribed and drained.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Non-blocking receive.
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.subscribers.lock().remove(&self.id);
        }
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
