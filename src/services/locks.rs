// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-engagement async locks.
//!
//! Two transitions on the same request/appointment ID in this process run
//! one after the other, so the gate's existence check and the engine's
//! writes see the same state. Other processes are fenced by the batch
//! preconditions instead.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub struct EngagementLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl EngagementLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    pub async fn acquire(&self, key: &str) -> EngagementGuard<'_> {
        let lock = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock_owned().await;
        EngagementGuard {
            locks: self,
            key: key.to_string(),
            guard: Some(guard),
        }
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Held while a transition runs; drops the map entry once nobody waits.
pub struct EngagementGuard<'a> {
    locks: &'a EngagementLocks,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for EngagementGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map's own reference left: nobody holds or waits on it.
        self.locks
            .locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}
