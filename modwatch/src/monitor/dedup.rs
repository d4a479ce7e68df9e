//! Duplicate suppression.
//!
//! [`SessionDedup`] tracks which updates a sweep has already dispatched and is
//! reset when a new sweep begins. [`EventDedup`] remembers completion event ids
//! for a rolling window, independent of any sweep.

use std::collections::HashSet;
use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;

/// Identity of one logical update: the mod plus a coarse time bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DedupKey {
    mod_id: i64,
    bucket: i64,
}

impl DedupKey {
    /// Bucket width in seconds.
    const BUCKET_SECS: i64 = 60;

    pub fn new(mod_id: i64, at: DateTime<Utc>) -> Self {
        Self {
            mod_id,
            bucket: at.timestamp().div_euclid(Self::BUCKET_SECS),
        }
    }

    pub fn mod_id(&self) -> i64 {
        self.mod_id
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mod:{}@{}", self.mod_id, self.bucket)
    }
}

/// Keys processed during the current sweep.
#[derive(Debug, Default)]
pub struct SessionDedup {
    processed: Mutex<HashSet<DedupKey>>,
}

impl SessionDedup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything from the previous sweep.
    pub fn begin_session(&self) {
        self.processed.lock().clear();
    }

    pub fn should_process(&self, key: &DedupKey) -> bool {
        !self.processed.lock().contains(key)
    }

    pub fn mark_processed(&self, key: DedupKey) {
        self.processed.lock().insert(key);
    }

    /// Check and mark in one step. Returns false if the key was already taken.
    pub fn try_claim(&self, key: DedupKey) -> bool {
        self.processed.lock().insert(key)
    }

    pub fn len(&self) -> usize {
        self.processed.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Completion event ids seen within a rolling window.
#[derive(Debug)]
pub struct EventDedup {
    seen: DashMap<String, Instant>,
    window: Duration,
}

impl EventDedup {
    pub fn new(window: Duration) -> Self {
        Self {
            seen: DashMap::new(),
            window,
        }
    }

    /// Returns true the first time an id is observed within the window.
    pub fn first_seen(&self, event_id: &str) -> bool {
        self.first_seen_at(event_id, Instant::now())
    }

    /// Remember an id without asking whether it was new.
    pub fn mark_seen(&self, event_id: &str) {
        self.first_seen(event_id);
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    fn first_seen_at(&self, event_id: &str, now: Instant) -> bool {
        self.evict_expired(now);
        match self.seen.entry(event_id.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
        }
    }

    fn evict_expired(&self, now: Instant) {
        let window = self.window;
        self.seen
            .retain(|_, seen_at| now.saturating_duration_since(*seen_at) < window);
    }
}
