//! Freshness Cache Module
//!
//! In-memory TTL map from endpoint key to parsed payload. Never persisted.

use std::collections::HashMap;

use serde_json::Value;

/// A payload and the time it was stored, always written together.
#[derive(Debug, Clone)]
struct FreshEntry {
    value: Value,
    inserted_at: u64,
}

// == Freshness Cache ==
#[derive(Debug)]
pub struct FreshnessCache {
    entries: HashMap<String, FreshEntry>,
    ttl_ms: u64,
}

impl FreshnessCache {
    // == Constructor ==
    pub fn new(ttl_ms: u64) -> Self {
        Self {
            entries: HashMap::new(),
            ttl_ms,
        }
    }

    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms
    }

    // == Validity ==
    /// True while `now_ms - inserted_at < ttl`.
    pub fn is_valid(&self, key: &str, now_ms: u64) -> bool {
        self.entries
            .get(key)
            .is_some_and(|e| now_ms.saturating_sub(e.inserted_at) < self.ttl_ms)
    }

    /// Returns the payload for `key` if still valid.
    pub fn get(&self, key: &str, now_ms: u64) -> Option<&Value> {
        if self.is_valid(key, now_ms) {
            self.entries.get(key).map(|e| &e.value)
        } else {
            None
        }
    }

    /// Stores `value` for `key`, replacing any previous pair.
    pub fn insert(&mut self, key: impl Into<String>, value: Value, now_ms: u64) {
        self.entries.insert(
            key.into(),
            FreshEntry {
                value,
                inserted_at: now_ms,
            },
        );
    }

    /// Rewrites the stored timestamp of an entry.
    ///
    /// Returns false when no entry exists for `key`.
    pub fn set_inserted_at(&mut self, key: &str, inserted_at: u64) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.inserted_at = inserted_at;
                true
            }
            None => false,
        }
    }

    /// Drops every entry whose TTL has elapsed. Returns how many were dropped.
    pub fn purge_expired(&mut self, now_ms: u64) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl_ms;
        self.entries
            .retain(|_, e| now_ms.saturating_sub(e.inserted_at) < ttl);
        before - self.entries.len()
    }

    /// Removes everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
