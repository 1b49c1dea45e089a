//! Durable Store Module
//!
//! Generation-scoped response storage that can be snapshotted to disk and
//! reloaded on restart.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ProxyError, Result};
use crate::store::lru::LruTracker;
use crate::store::CachedResponse;

/// Default cap on evictable entries per generation.
pub const DEFAULT_MAX_ENTRIES: usize = 500;

fn default_max_entries() -> usize {
    DEFAULT_MAX_ENTRIES
}

/// Responses stored under one generation tag, keyed by request URL.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Generation {
    /// Install order; higher is newer
    #[serde(default)]
    sequence: u64,
    entries: HashMap<String, CachedResponse>,
    /// Keys committed at install time, exempt from eviction
    #[serde(default)]
    pinned: HashSet<String>,
    /// Access order of every other key
    #[serde(default)]
    recency: LruTracker,
}

impl Generation {
    fn new(sequence: u64) -> Self {
        Self {
            sequence,
            ..Self::default()
        }
    }

    /// Inserts or replaces `key`, evicting least recently used entries past
    /// `max_entries`. Returns the evicted keys.
    fn insert(&mut self, key: &str, response: CachedResponse, max_entries: usize) -> Vec<String> {
        if !self.pinned.contains(key) {
            self.recency.touch(key);
        }
        self.entries.insert(key.to_string(), response);
        self.evict_over(max_entries)
    }

    fn evict_over(&mut self, max_entries: usize) -> Vec<String> {
        let mut evicted = Vec::new();
        while self.recency.len() > max_entries {
            match self.recency.evict_oldest() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                    evicted.push(oldest);
                }
                None => break,
            }
        }
        evicted
    }

    /// Tracks entries restored from a snapshot without recency data.
    fn reconcile(&mut self) {
        let untracked: Vec<String> = self
            .entries
            .keys()
            .filter(|key| {
                !self.pinned.contains(key.as_str()) && !self.recency.contains(key.as_str())
            })
            .cloned()
            .collect();
        for key in untracked {
            self.recency.touch(&key);
        }
    }
}

// == Durable Store ==
/// Named generations of cached responses.
///
/// Writes always replace a whole entry. Only 2xx responses are accepted.
/// Entries written at runtime are capped per generation with LRU eviction;
/// entries committed at install are pinned.
#[derive(Debug, Serialize, Deserialize)]
pub struct DurableStore {
    generations: BTreeMap<String, Generation>,
    #[serde(default)]
    next_sequence: u64,
    #[serde(skip, default = "default_max_entries")]
    max_entries: usize,
}

impl Default for DurableStore {
    fn default() -> Self {
        Self::with_max_entries(DEFAULT_MAX_ENTRIES)
    }
}

impl DurableStore {
    // == Constructor ==
    /// Creates an empty store with the default entry cap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store holding at most `max_entries` evictable
    /// entries per generation.
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            generations: BTreeMap::new(),
            next_sequence: 0,
            max_entries: max_entries.max(1),
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Changes the cap, evicting right away where a generation exceeds it.
    ///
    /// Returns the number of entries evicted.
    pub fn set_max_entries(&mut self, max_entries: usize) -> usize {
        self.max_entries = max_entries.max(1);
        let max = self.max_entries;
        self.generations
            .values_mut()
            .map(|g| g.evict_over(max).len())
            .sum()
    }

    fn generation_mut(&mut self, generation: &str) -> &mut Generation {
        let next = &mut self.next_sequence;
        self.generations
            .entry(generation.to_string())
            .or_insert_with(|| {
                let created = Generation::new(*next);
                *next += 1;
                created
            })
    }

    // == Put ==
    /// Stores `response` for `key` in `generation`, replacing any previous entry.
    ///
    /// The generation is created on first write.
    pub fn put(&mut self, generation: &str, key: &str, response: CachedResponse) -> Result<()> {
        if !response.is_success() {
            return Err(ProxyError::InvalidRequest(format!(
                "Refusing to store status {} for {}",
                response.status, key
            )));
        }

        let max = self.max_entries;
        let evicted = self.generation_mut(generation).insert(key, response, max);
        for old in &evicted {
            debug!("Evicted {} from {}", old, generation);
        }
        Ok(())
    }

    // == Commit ==
    /// Writes a batch of staged entries at once and marks `generation` as
    /// the most recently installed.
    ///
    /// Either every entry is accepted or nothing is written. Committed
    /// entries are pinned.
    pub fn commit(&mut self, generation: &str, staged: Vec<(String, CachedResponse)>) -> Result<()> {
        if let Some((key, resp)) = staged.iter().find(|(_, resp)| !resp.is_success()) {
            return Err(ProxyError::InvalidRequest(format!(
                "Refusing to commit status {} for {}",
                resp.status, key
            )));
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let target = self.generation_mut(generation);
        target.sequence = sequence;
        for (key, resp) in staged {
            target.recency.remove(&key);
            target.pinned.insert(key.clone());
            target.entries.insert(key, resp);
        }
        Ok(())
    }

    // == Get ==
    /// Looks up the entry for `key` in `generation`.
    pub fn get(&self, generation: &str, key: &str) -> Option<&CachedResponse> {
        self.generations.get(generation)?.entries.get(key)
    }

    /// Looks up `key` and marks it as recently used.
    pub fn lookup(&mut self, generation: &str, key: &str) -> Option<CachedResponse> {
        let target = self.generations.get_mut(generation)?;
        let found = target.entries.get(key)?.clone();
        if !target.pinned.contains(key) {
            target.recency.touch(key);
        }
        Some(found)
    }

    /// Checks whether `key` is cached in `generation`.
    pub fn contains(&self, generation: &str, key: &str) -> bool {
        self.get(generation, key).is_some()
    }

    // == Generations ==
    /// Lists every generation tag present, in sorted order.
    pub fn generation_names(&self) -> Vec<String> {
        self.generations.keys().cloned().collect()
    }

    /// Checks whether `generation` holds at least one entry.
    pub fn has_generation(&self, generation: &str) -> bool {
        self.generations
            .get(generation)
            .is_some_and(|g| !g.entries.is_empty())
    }

    /// The most recently installed non-empty generation other than `current`.
    pub fn latest_generation_except(&self, current: &str) -> Option<String> {
        self.generations
            .iter()
            .filter(|(name, g)| name.as_str() != current && !g.entries.is_empty())
            .max_by_key(|(_, g)| g.sequence)
            .map(|(name, _)| name.clone())
    }

    /// Deletes one generation and all of its entries.
    pub fn delete_generation(&mut self, generation: &str) -> bool {
        self.generations.remove(generation).is_some()
    }

    // == Retain Only ==
    /// Deletes every generation except `current`.
    ///
    /// Returns the tags that were removed.
    pub fn retain_only(&mut self, current: &str) -> Vec<String> {
        let stale: Vec<String> = self
            .generations
            .keys()
            .filter(|name| name.as_str() != current)
            .cloned()
            .collect();

        for name in &stale {
            self.generations.remove(name);
        }
        stale
    }

    // == Length ==
    /// Number of entries in `generation`.
    pub fn len(&self, generation: &str) -> usize {
        self.generations
            .get(generation)
            .map_or(0, |g| g.entries.len())
    }

    /// Number of entries across all generations.
    pub fn total_entries(&self) -> usize {
        self.generations.values().map(|g| g.entries.len()).sum()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.total_entries() == 0
    }

    // == Snapshot ==
    /// Serializes the whole store to JSON.
    pub fn to_snapshot(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Rebuilds a store from a JSON snapshot.
    ///
    /// The cap is not part of the snapshot; it starts at the default.
    pub fn from_snapshot(snapshot: &str) -> Result<Self> {
        let mut store: Self = serde_json::from_str(snapshot)?;
        for generation in store.generations.values_mut() {
            generation.reconcile();
        }
        Ok(store)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::with_timestamp;

    const GEN: &str = "gen-v1";

    fn ok(body: &str) -> CachedResponse {
        CachedResponse::text(200, body)
    }

    #[test]
    fn test_store_new() {
        let store = DurableStore::new();
        assert!(store.is_empty());
        assert!(store.generation_names().is_empty());
    }

    #[test]
    fn test_put_and_get() {
        let mut store = DurableStore::new();
        store.put(GEN, "http://o/a", ok("a")).unwrap();

        assert_eq!(store.get(GEN, "http://o/a").unwrap().body, b"a");
        assert!(store.get("other", "http://o/a").is_none());
        assert_eq!(store.len(GEN), 1);
    }

    #[test]
    fn test_put_overwrites_whole_entry() {
        let mut store = DurableStore::new();
        store
            .put(GEN, "http://o/a", with_timestamp(&ok("old"), 1))
            .unwrap();
        store
            .put(GEN, "http://o/a", with_timestamp(&ok("new"), 2))
            .unwrap();

        let entry = store.get(GEN, "http://o/a").unwrap();
        assert_eq!(entry.body, b"new");
        assert_eq!(entry.cached_at(), Some(2));
        assert_eq!(store.len(GEN), 1);
    }

    #[test]
    fn test_put_rejects_non_success() {
        let mut store = DurableStore::new();

        let result = store.put(GEN, "http://o/missing", CachedResponse::text(404, "nope"));
        assert!(matches!(result, Err(ProxyError::InvalidRequest(_))));
        assert!(!store.contains(GEN, "http://o/missing"));
    }

    #[test]
    fn test_commit_is_all_or_nothing() {
        let mut store = DurableStore::new();
        let staged = vec![
            ("http://o/".to_string(), ok("root")),
            ("http://o/broken".to_string(), CachedResponse::text(500, "x")),
        ];

        assert!(store.commit(GEN, staged).is_err());
        assert!(store.is_empty());

        let staged = vec![
            ("http://o/".to_string(), ok("root")),
            ("http://o/index.html".to_string(), ok("index")),
        ];
        store.commit(GEN, staged).unwrap();
        assert_eq!(store.len(GEN), 2);
    }

    #[test]
    fn test_retain_only_purges_prior_generations() {
        let mut store = DurableStore::new();
        store.put("gen-v0", "http://o/a", ok("old")).unwrap();
        store.put("legacy", "http://o/b", ok("older")).unwrap();
        store.put(GEN, "http://o/a", ok("current")).unwrap();

        let mut removed = store.retain_only(GEN);
        removed.sort();

        assert_eq!(removed, vec!["gen-v0".to_string(), "legacy".to_string()]);
        assert_eq!(store.generation_names(), vec![GEN.to_string()]);
        assert_eq!(store.get(GEN, "http://o/a").unwrap().body, b"current");
    }

    #[test]
    fn test_delete_generation() {
        let mut store = DurableStore::new();
        store.put(GEN, "http://o/a", ok("a")).unwrap();

        assert!(store.delete_generation(GEN));
        assert!(!store.delete_generation(GEN));
        assert!(!store.has_generation(GEN));
    }

    #[test]
    fn test_snapshot_restores_generations() {
        let mut store = DurableStore::new();
        store
            .put(GEN, "http://o/data/metadata.json", with_timestamp(&ok("{}"), 7))
            .unwrap();

        let snapshot = store.to_snapshot().unwrap();
        let restored = DurableStore::from_snapshot(&snapshot).unwrap();

        let entry = restored.get(GEN, "http://o/data/metadata.json").unwrap();
        assert_eq!(entry.cached_at(), Some(7));
        assert_eq!(restored.total_entries(), 1);
    }

    #[test]
    fn test_corrupt_snapshot_is_an_error() {
        let result = DurableStore::from_snapshot("{not json");
        assert!(matches!(result, Err(ProxyError::Snapshot(_))));
    }

    #[test]
    fn test_put_evicts_least_recently_used_past_cap() {
        let mut store = DurableStore::with_max_entries(2);
        store.put(GEN, "http://o/a", ok("a")).unwrap();
        store.put(GEN, "http://o/b", ok("b")).unwrap();
        assert!(store.lookup(GEN, "http://o/a").is_some());

        store.put(GEN, "http://o/c", ok("c")).unwrap();

        assert_eq!(store.len(GEN), 2);
        assert!(store.contains(GEN, "http://o/a"));
        assert!(!store.contains(GEN, "http://o/b"));
        assert!(store.contains(GEN, "http://o/c"));
    }

    #[test]
    fn test_committed_entries_are_never_evicted() {
        let mut store = DurableStore::with_max_entries(1);
        store
            .commit(GEN, vec![("http://o/index.html".to_string(), ok("shell"))])
            .unwrap();

        for i in 0..10 {
            store
                .put(GEN, &format!("http://o/index.html?cb={}", i), ok("x"))
                .unwrap();
        }
        store.put(GEN, "http://o/index.html", ok("fresh shell")).unwrap();

        assert_eq!(store.len(GEN), 2);
        assert_eq!(store.get(GEN, "http://o/index.html").unwrap().body, b"fresh shell");
        assert!(store.contains(GEN, "http://o/index.html?cb=9"));
    }

    #[test]
    fn test_lowering_cap_evicts_immediately() {
        let mut store = DurableStore::new();
        for i in 0..5 {
            store.put(GEN, &format!("http://o/{}", i), ok("x")).unwrap();
        }

        assert_eq!(store.set_max_entries(3), 2);
        assert_eq!(store.len(GEN), 3);
        assert!(!store.contains(GEN, "http://o/0"));
        assert!(store.contains(GEN, "http://o/4"));
    }

    #[test]
    fn test_latest_generation_follows_install_order_not_name() {
        let mut store = DurableStore::new();
        store
            .commit("gen-v9", vec![("http://o/".to_string(), ok("nine"))])
            .unwrap();
        store
            .commit("gen-v10", vec![("http://o/".to_string(), ok("ten"))])
            .unwrap();

        assert_eq!(
            store.latest_generation_except("gen-v11"),
            Some("gen-v10".to_string())
        );
        assert_eq!(
            store.latest_generation_except("gen-v10"),
            Some("gen-v9".to_string())
        );
    }

    #[test]
    fn test_latest_generation_skips_empty_and_current() {
        let mut store = DurableStore::new();
        store.commit("gen-v1", Vec::new()).unwrap();
        assert_eq!(store.latest_generation_except("gen-v2"), None);

        store.put("gen-v2", "http://o/a", ok("a")).unwrap();
        assert_eq!(store.latest_generation_except("gen-v2"), None);
    }

    #[test]
    fn test_snapshot_keeps_install_order_and_pins() {
        let mut store = DurableStore::with_max_entries(1);
        store
            .commit("gen-v9", vec![("http://o/".to_string(), ok("nine"))])
            .unwrap();
        store
            .commit("gen-v10", vec![("http://o/".to_string(), ok("ten"))])
            .unwrap();
        store.put("gen-v10", "http://o/a", ok("a")).unwrap();

        let mut restored = DurableStore::from_snapshot(&store.to_snapshot().unwrap()).unwrap();
        assert_eq!(
            restored.latest_generation_except("gen-v11"),
            Some("gen-v10".to_string())
        );

        restored.set_max_entries(1);
        restored.put("gen-v10", "http://o/b", ok("b")).unwrap();
        assert!(restored.contains("gen-v10", "http://o/"));
        assert!(!restored.contains("gen-v10", "http://o/a"));
        assert!(restored.contains("gen-v10", "http://o/b"));
    }
}
