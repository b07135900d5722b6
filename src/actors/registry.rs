//! # Timer Registry & Count Aggregator
//!
//! The registry maps a timer identity to the cancellation handle of its
//! running task; at most one entry exists per identity. The count
//! aggregator tracks live timers per actor type and mirrors every change
//! into the active-timers gauge.

use super::timer::TimerKey;
use crate::metrics::actors as actor_metrics;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Cancellation handle of one running timer task
#[derive(Debug, Clone)]
pub struct TimerHandle {
    /// Distinguishes a replacement from the entry it replaced
    pub generation: u64,
    pub token: CancellationToken,
}

/// Concurrent map of live timers
#[derive(Debug, Default)]
pub struct TimerRegistry {
    timers: DashMap<TimerKey, TimerHandle>,
    next_generation: AtomicU64,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &TimerKey) -> Option<TimerHandle> {
        self.timers.get(key).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, key: &TimerKey) -> bool {
        self.timers.contains_key(key)
    }

    /// Stores a fresh handle for `key`, returning it with the handle it
    /// displaced, if any. The displaced handle is not cancelled here.
    pub fn put(&self, key: TimerKey) -> (TimerHandle, Option<TimerHandle>) {
        let handle = TimerHandle {
            generation: self.next_generation.fetch_add(1, Ordering::Relaxed),
            token: CancellationToken::new(),
        };
        let previous = self.timers.insert(key, handle.clone());
        (handle, previous)
    }

    pub fn remove(&self, key: &TimerKey) -> Option<TimerHandle> {
        self.timers.remove(key).map(|(_, handle)| handle)
    }

    /// Removes `key` only while it still holds `generation`.
    pub fn compare_and_remove(&self, key: &TimerKey, generation: u64) -> bool {
        self.timers
            .remove_if(key, |_, handle| handle.generation == generation)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

/// Live timer counts per actor type
#[derive(Debug, Default)]
pub struct ActiveTimerCounts {
    counts: RwLock<HashMap<String, Arc<AtomicI64>>>,
}

impl ActiveTimerCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `delta` to the actor type's count and records the new value.
    pub fn update(&self, actor_type: &str, delta: i64) -> i64 {
        let counter = self.counter(actor_type);
        let value = counter.fetch_add(delta, Ordering::SeqCst) + delta;
        actor_metrics::record_active_timers(actor_type, value);
        value
    }

    pub fn get(&self, actor_type: &str) -> i64 {
        self.counts
            .read()
            .get(actor_type)
            .map_or(0, |counter| counter.load(Ordering::SeqCst))
    }

    fn counter(&self, actor_type: &str) -> Arc<AtomicI64> {
        if let Some(counter) = self.counts.read().get(actor_type) {
            return Arc::clone(counter);
        }
        let mut counts = self.counts.write();
        // Re-check under the write lock
        Arc::clone(
            counts
                .entry(actor_type.to_string())
                .or_insert_with(|| Arc::new(AtomicI64::new(0))),
        )
    }
}
