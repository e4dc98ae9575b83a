//! Entry Store Module
//!
//! Key to entry mapping with capacity enforcement. Every mutation updates the
//! eviction tracker in the same call, so callers holding the store lock never
//! observe entries and ordering metadata out of step.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tokio::time::Instant;

use crate::cache::{CacheEntry, EntryInfo, EvictionTracker};
use crate::config::EvictionPolicy;
use crate::error::{CacheError, Result};

// == Lookup ==
/// Outcome of reading a key from the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<V> {
    /// Live entry; recency and frequency were updated
    Hit(V),
    /// No entry for the key
    Miss,
    /// Entry had expired and was removed
    Expired,
    /// Entry had expired but holds unflushed data, so it stays resident
    ExpiredDirty(DirtySnapshot<V>),
}

// == Dirty Snapshot ==
/// Copy of a dirty entry taken under the lock for flushing outside it.
#[derive(Debug, Clone, PartialEq)]
pub struct DirtySnapshot<V> {
    pub key: String,
    pub value: V,
    pub version: u64,
}

// == Insertion ==
/// Outcome of an insert attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Insertion<V> {
    /// Value is resident; `evicted` lists keys removed to make room
    Inserted { evicted: Vec<String> },
    /// Key was already resident and the insert was conditional
    Skipped,
    /// Making room requires evicting these dirty entries; nothing was changed
    BlockedByDirty(Vec<DirtySnapshot<V>>),
}

// == Insert Request ==
/// Parameters of a single insert.
#[derive(Debug, Clone)]
pub struct InsertRequest<V> {
    pub key: String,
    pub value: V,
    pub size: usize,
    pub ttl: Option<Duration>,
    pub dirty: bool,
    /// Set for values fetched by a backend load. The insert is skipped if a
    /// live entry exists or the ticket was revoked by a write since the load
    /// began.
    pub load_ticket: Option<u64>,
}

impl<V> InsertRequest<V> {
    /// Conditional insert of a value fetched by the load holding `ticket`.
    pub fn loaded(
        key: impl Into<String>,
        value: V,
        size: usize,
        ttl: Option<Duration>,
        ticket: u64,
    ) -> Self {
        Self {
            key: key.into(),
            value,
            size,
            ttl,
            dirty: false,
            load_ticket: Some(ticket),
        }
    }
}

// == Entry Store ==
/// Resident entries plus the eviction metadata that orders them.
#[derive(Debug)]
pub struct EntryStore<V> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<V>>,
    /// Eviction ordering
    tracker: EvictionTracker,
    /// Maximum aggregate size
    capacity: usize,
    /// Aggregate size of resident entries
    used: usize,
    /// Store-wide counter for entry versions and load tickets, never reused
    next_version: u64,
    /// Ticket of the in-flight backend load per key
    loads: HashMap<String, u64>,
}

impl<V: Clone> EntryStore<V> {
    // == Constructor ==
    /// Creates an empty store.
    ///
    /// # Errors
    /// `CapacityMisconfigured` if `capacity` is zero.
    pub fn new(capacity: usize, policy: EvictionPolicy) -> Result<Self> {
        if capacity == 0 {
            return Err(CacheError::CapacityMisconfigured(
                "capacity must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            entries: HashMap::new(),
            tracker: EvictionTracker::new(policy),
            capacity,
            used: 0,
            next_version: 0,
            loads: HashMap::new(),
        })
    }

    // == Lookup ==
    /// Reads a key, expiring it lazily before any eviction bookkeeping runs.
    pub fn lookup(&mut self, key: &str) -> Lookup<V> {
        let now = Instant::now();
        let Some(entry) = self.entries.get_mut(key) else {
            return Lookup::Miss;
        };

        if entry.is_expired_at(now) {
            if entry.dirty {
                return Lookup::ExpiredDirty(DirtySnapshot {
                    key: key.to_string(),
                    value: entry.value.clone(),
                    version: entry.version,
                });
            }
            self.remove(key);
            return Lookup::Expired;
        }

        entry.record_access();
        let value = entry.value.clone();
        self.tracker.on_access(key);
        Lookup::Hit(value)
    }

    // == Peek ==
    /// Reads entry metadata without touching eviction order.
    /// Expired entries are reported as absent.
    pub fn peek(&self, key: &str) -> Option<EntryInfo> {
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(EntryInfo::from)
    }

    /// True if a live (non-expired) entry exists.
    pub fn contains(&self, key: &str) -> bool {
        self.peek(key).is_some()
    }

    // == Insert ==
    /// Inserts or overwrites an entry, evicting in policy order until it fits.
    ///
    /// Keys in `pinned` are never chosen as victims. Nothing is mutated unless
    /// the result is `Inserted`.
    ///
    /// # Errors
    /// - `EntryTooLarge` if the entry exceeds total capacity
    /// - `CacheFull` if the unpinned entries cannot free enough space
    pub fn insert(
        &mut self,
        request: InsertRequest<V>,
        pinned: &HashSet<String>,
    ) -> Result<Insertion<V>> {
        let InsertRequest {
            key,
            value,
            size,
            ttl,
            dirty,
            load_ticket,
        } = request;

        // Any direct write makes an in-flight load's value stale
        if load_ticket.is_none() {
            self.loads.remove(&key);
        }

        if size > self.capacity {
            return Err(CacheError::EntryTooLarge {
                key,
                size,
                capacity: self.capacity,
            });
        }

        // An expired clean entry is as good as absent; an expired dirty one
        // still holds data that must reach the backend first.
        let existing = self
            .entries
            .get(&key)
            .map(|entry| (entry.size, entry.dirty || !entry.is_expired()));
        if let Some(ticket) = load_ticket {
            let revoked = self.loads.get(&key) != Some(&ticket);
            if revoked || matches!(existing, Some((_, true))) {
                return Ok(Insertion::Skipped);
            }
        }

        let existing_size = existing.map(|(s, _)| s).unwrap_or(0);
        let needed = (self.used - existing_size + size).saturating_sub(self.capacity);

        let mut victims = Vec::new();
        if needed > 0 {
            let mut freed = 0;
            let mut blocked = Vec::new();
            for candidate in self.tracker.candidates() {
                if candidate == key || pinned.contains(candidate) {
                    continue;
                }
                let Some(entry) = self.entries.get(candidate) else {
                    continue;
                };
                if entry.dirty {
                    blocked.push(DirtySnapshot {
                        key: candidate.to_string(),
                        value: entry.value.clone(),
                        version: entry.version,
                    });
                }
                victims.push(candidate.to_string());
                freed += entry.size;
                if freed >= needed {
                    break;
                }
            }

            if freed < needed {
                return Err(CacheError::CacheFull(format!(
                    "cannot free {} units for '{}'",
                    needed, key
                )));
            }
            if !blocked.is_empty() {
                return Ok(Insertion::BlockedByDirty(blocked));
            }
        }

        let evicted = victims
            .into_iter()
            .filter(|victim| self.remove(victim).is_some())
            .collect();

        self.next_version += 1;
        let version = self.next_version;
        match self.entries.get_mut(&key) {
            Some(entry) => {
                self.used = self.used - entry.size + size;
                entry.overwrite(value, size, ttl);
                entry.dirty = dirty;
                entry.version = version;
                self.tracker.on_access(&key);
            }
            None => {
                let mut entry = CacheEntry::new(value, size, ttl);
                entry.dirty = dirty;
                entry.version = version;
                self.used += size;
                self.tracker.on_insert(&key);
                self.entries.insert(key, entry);
            }
        }
        debug_assert_eq!(self.tracker.len(), self.entries.len());

        Ok(Insertion::Inserted { evicted })
    }

    // == Remove ==
    /// Removes an entry by key, returning it if it was resident.
    pub fn remove(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.tracker.remove(key);
        self.used -= entry.size;
        debug_assert_eq!(self.tracker.len(), self.entries.len());
        Some(entry)
    }

    // == Discard ==
    /// Removes an entry and revokes any in-flight load for the key, so a
    /// value read from the backend before this call is never cached.
    pub fn discard(&mut self, key: &str) -> Option<CacheEntry<V>> {
        self.loads.remove(key);
        self.remove(key)
    }

    // == Load Tickets ==
    /// Registers a backend load for `key`. Pass the ticket with the
    /// populating insert.
    pub fn begin_load(&mut self, key: &str) -> u64 {
        self.next_version += 1;
        self.loads.insert(key.to_string(), self.next_version);
        self.next_version
    }

    /// Drops the ticket of a finished load unless a newer one replaced it.
    pub fn end_load(&mut self, key: &str, ticket: u64) {
        if self.loads.get(key) == Some(&ticket) {
            self.loads.remove(key);
        }
    }

    /// Number of loads holding a live ticket.
    #[cfg(test)]
    fn pending_loads(&self) -> usize {
        self.loads.len()
    }

    // == Mark Clean ==
    /// Clears the dirty flag if the entry still holds the flushed version.
    pub fn mark_clean(&mut self, key: &str, version: u64) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) if entry.version == version => {
                entry.dirty = false;
                true
            }
            _ => false,
        }
    }

    /// Snapshots a single entry if it is dirty.
    pub fn dirty_snapshot(&self, key: &str) -> Option<DirtySnapshot<V>> {
        self.entries
            .get(key)
            .filter(|entry| entry.dirty)
            .map(|entry| DirtySnapshot {
                key: key.to_string(),
                value: entry.value.clone(),
                version: entry.version,
            })
    }

    // == Dirty Batch ==
    /// Snapshots up to `max` dirty entries, next eviction victims first.
    pub fn dirty_batch(&self, max: usize) -> Vec<DirtySnapshot<V>> {
        self.tracker
            .candidates()
            .filter_map(|key| {
                self.entries
                    .get(key)
                    .filter(|entry| entry.dirty)
                    .map(|entry| DirtySnapshot {
                        key: key.to_string(),
                        value: entry.value.clone(),
                        version: entry.version,
                    })
            })
            .take(max)
            .collect()
    }

    // == Remove Expired ==
    /// Removes all expired clean entries. Expired dirty entries are left for
    /// the flush cycle.
    ///
    /// Returns the number of entries removed.
    pub fn remove_expired(&mut self) -> usize {
        let now = Instant::now();
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.dirty && entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }

    /// Removes a key only if it is expired and clean.
    pub fn remove_if_expired(&mut self, key: &str) -> bool {
        let expired = self
            .entries
            .get(key)
            .is_some_and(|entry| !entry.dirty && entry.is_expired());
        if expired {
            self.remove(key);
        }
        expired
    }

    /// Resident keys in eviction order, next victim first.
    pub fn keys_in_eviction_order(&self) -> Vec<String> {
        self.tracker.candidates().map(str::to_string).collect()
    }

    pub fn dirty_count(&self) -> usize {
        self.entries.values().filter(|entry| entry.dirty).count()
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.tracker.policy()
    }

    // == Length ==
    /// Returns the number of resident entries, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn request(key: &str, size: usize) -> InsertRequest<String> {
        InsertRequest {
            key: key.to_string(),
            value: format!("value_{}", key),
            size,
            ttl: None,
            dirty: false,
            load_ticket: None,
        }
    }

    fn put(store: &mut EntryStore<String>, key: &str) -> Vec<String> {
        match store.insert(request(key, 1), &HashSet::new()).unwrap() {
            Insertion::Inserted { evicted } => evicted,
            other => panic!("unexpected insertion outcome: {:?}", other),
        }
    }

    fn hit(store: &mut EntryStore<String>, key: &str) {
        assert!(matches!(store.lookup(key), Lookup::Hit(_)));
    }

    #[test]
    fn test_store_new_rejects_zero_capacity() {
        assert!(matches!(
            EntryStore::<String>::new(0, EvictionPolicy::Lru),
            Err(CacheError::CapacityMisconfigured(_))
        ));
    }

    #[test]
    fn test_store_insert_and_lookup() {
        let mut store = EntryStore::new(10, EvictionPolicy::Lru).unwrap();
        put(&mut store, "key1");

        assert_eq!(store.lookup("key1"), Lookup::Hit("value_key1".to_string()));
        assert_eq!(store.lookup("missing"), Lookup::Miss);
        assert_eq!(store.len(), 1);
        assert_eq!(store.used(), 1);
    }

    #[test]
    fn test_store_overwrite_keeps_single_entry() {
        let mut store = EntryStore::new(10, EvictionPolicy::Lru).unwrap();
        store.insert(request("k", 3), &HashSet::new()).unwrap();
        store.insert(request("k", 5), &HashSet::new()).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.used(), 5);
    }

    #[test]
    fn test_lru_eviction_order() {
        let mut store = EntryStore::new(4, EvictionPolicy::Lru).unwrap();
        for key in ["B", "A", "C", "D"] {
            put(&mut store, key);
        }
        // Most to least recent: D, C, A, B
        assert_eq!(put(&mut store, "E"), vec!["B"]);

        let mut mru_first = store.keys_in_eviction_order();
        mru_first.reverse();
        assert_eq!(mru_first, vec!["E", "D", "C", "A"]);
    }

    #[test]
    fn test_lfu_eviction_order() {
        let mut store = EntryStore::new(4, EvictionPolicy::Lfu).unwrap();
        for (key, frequency) in [("A", 5), ("B", 2), ("C", 4), ("D", 3)] {
            put(&mut store, key);
            for _ in 1..frequency {
                hit(&mut store, key);
            }
        }

        assert_eq!(put(&mut store, "E"), vec!["B"]);
    }

    #[test]
    fn test_lfu_tie_evicts_earliest_inserted() {
        let mut store = EntryStore::new(3, EvictionPolicy::Lfu).unwrap();
        put(&mut store, "x");
        put(&mut store, "y");
        put(&mut store, "z");

        assert_eq!(put(&mut store, "w"), vec!["x"]);
    }

    #[test]
    fn test_fifo_ignores_access() {
        let mut store = EntryStore::new(4, EvictionPolicy::Fifo).unwrap();
        for key in ["A", "B", "C", "D"] {
            put(&mut store, key);
        }
        hit(&mut store, "A");
        hit(&mut store, "A");

        assert_eq!(put(&mut store, "E"), vec!["A"]);
    }

    #[test]
    fn test_sized_eviction_frees_enough_space() {
        let mut store = EntryStore::new(10, EvictionPolicy::Fifo).unwrap();
        store.insert(request("a", 4), &HashSet::new()).unwrap();
        store.insert(request("b", 4), &HashSet::new()).unwrap();
        store.insert(request("c", 2), &HashSet::new()).unwrap();

        let outcome = store.insert(request("d", 7), &HashSet::new()).unwrap();
        let evicted = match outcome {
            Insertion::Inserted { evicted } => evicted,
            other => panic!("unexpected outcome {:?}", other),
        };
        assert_eq!(evicted, vec!["a", "b"]);
        assert_eq!(store.used(), 9);
    }

    #[test]
    fn test_entry_too_large_changes_nothing() {
        let mut store = EntryStore::new(4, EvictionPolicy::Lru).unwrap();
        put(&mut store, "a");

        let result = store.insert(request("huge", 5), &HashSet::new());
        assert!(matches!(result, Err(CacheError::EntryTooLarge { .. })));
        assert_eq!(store.len(), 1);
        assert_eq!(store.used(), 1);
    }

    #[test]
    fn test_dirty_victim_blocks_insert() {
        let mut store = EntryStore::new(2, EvictionPolicy::Lru).unwrap();
        let mut dirty = request("a", 1);
        dirty.dirty = true;
        store.insert(dirty, &HashSet::new()).unwrap();
        put(&mut store, "b");

        let outcome = store.insert(request("c", 1), &HashSet::new()).unwrap();
        match outcome {
            Insertion::BlockedByDirty(snapshots) => {
                assert_eq!(snapshots.len(), 1);
                assert_eq!(snapshots[0].key, "a");
            }
            other => panic!("expected block, got {:?}", other),
        }
        assert_eq!(store.len(), 2);
        assert!(store.contains("a"));
    }

    #[test]
    fn test_pinned_victim_is_skipped() {
        let mut store = EntryStore::new(2, EvictionPolicy::Lru).unwrap();
        let mut dirty = request("a", 1);
        dirty.dirty = true;
        store.insert(dirty, &HashSet::new()).unwrap();
        put(&mut store, "b");

        let pinned: HashSet<String> = ["a".to_string()].into_iter().collect();
        let outcome = store.insert(request("c", 1), &pinned).unwrap();
        assert!(matches!(outcome, Insertion::Inserted { ref evicted } if evicted[0] == "b"));
        assert!(store.contains("a"));
    }

    #[test]
    fn test_all_victims_pinned_is_cache_full() {
        let mut store = EntryStore::new(1, EvictionPolicy::Lru).unwrap();
        put(&mut store, "a");

        let pinned: HashSet<String> = ["a".to_string()].into_iter().collect();
        let result = store.insert(request("b", 1), &pinned);
        assert!(matches!(result, Err(CacheError::CacheFull(_))));
    }

    #[test]
    fn test_mark_clean_requires_matching_version() {
        let mut store = EntryStore::new(4, EvictionPolicy::Lru).unwrap();
        let mut dirty = request("a", 1);
        dirty.dirty = true;
        store.insert(dirty.clone(), &HashSet::new()).unwrap();
        let first = store.dirty_batch(10).remove(0);

        // Rewritten before the flush acknowledged
        store.insert(dirty, &HashSet::new()).unwrap();

        assert!(!store.mark_clean("a", first.version));
        assert_eq!(store.dirty_count(), 1);

        let second = store.dirty_batch(10).remove(0);
        assert!(store.mark_clean("a", second.version));
        assert_eq!(store.dirty_count(), 0);
    }

    fn loaded(key: &str, ticket: u64) -> InsertRequest<String> {
        InsertRequest::loaded(key, "loaded".to_string(), 1, None, ticket)
    }

    #[test]
    fn test_loaded_value_skips_live_entry() {
        let mut store = EntryStore::new(4, EvictionPolicy::Lru).unwrap();
        put(&mut store, "a");
        let ticket = store.begin_load("a");

        let req = loaded("a", ticket);
        assert_eq!(store.insert(req, &HashSet::new()).unwrap(), Insertion::Skipped);
        assert_eq!(store.lookup("a"), Lookup::Hit("value_a".to_string()));
    }

    #[test]
    fn test_loaded_value_is_cached_with_live_ticket() {
        let mut store = EntryStore::new(4, EvictionPolicy::Lru).unwrap();
        let ticket = store.begin_load("a");

        let req = loaded("a", ticket);
        assert!(matches!(
            store.insert(req, &HashSet::new()).unwrap(),
            Insertion::Inserted { .. }
        ));
        store.end_load("a", ticket);

        assert_eq!(store.lookup("a"), Lookup::Hit("loaded".to_string()));
        assert_eq!(store.pending_loads(), 0);
    }

    #[test]
    fn test_discard_revokes_in_flight_load() {
        let mut store = EntryStore::new(4, EvictionPolicy::Lru).unwrap();
        let ticket = store.begin_load("a");
        store.discard("a");

        let req = loaded("a", ticket);
        assert_eq!(store.insert(req, &HashSet::new()).unwrap(), Insertion::Skipped);
        assert_eq!(store.lookup("a"), Lookup::Miss);
    }

    #[test]
    fn test_write_then_evict_revokes_in_flight_load() {
        let mut store = EntryStore::new(1, EvictionPolicy::Lru).unwrap();
        let ticket = store.begin_load("a");
        put(&mut store, "a");
        // Evicts the fresh value, leaving the slot empty again
        put(&mut store, "b");

        let req = loaded("a", ticket);
        assert_eq!(store.insert(req, &HashSet::new()).unwrap(), Insertion::Skipped);
        assert!(!store.contains("a"));
    }

    #[test]
    fn test_end_load_keeps_newer_ticket() {
        let mut store = EntryStore::<String>::new(4, EvictionPolicy::Lru).unwrap();
        let first = store.begin_load("a");
        let second = store.begin_load("a");

        store.end_load("a", first);
        assert_eq!(store.pending_loads(), 1);
        store.end_load("a", second);
        assert_eq!(store.pending_loads(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lazy_expiration_removes_entry() {
        let mut store = EntryStore::new(4, EvictionPolicy::Lru).unwrap();
        let mut req = request("a", 1);
        req.ttl = Some(Duration::from_secs(1));
        store.insert(req, &HashSet::new()).unwrap();

        tokio::time::advance(Duration::from_millis(1100)).await;

        assert_eq!(store.lookup("a"), Lookup::Expired);
        assert_eq!(store.len(), 0);
        assert_eq!(store.used(), 0);
        assert!(store.keys_in_eviction_order().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_dirty_entry_stays_resident() {
        let mut store = EntryStore::new(4, EvictionPolicy::Lru).unwrap();
        let mut req = request("a", 1);
        req.ttl = Some(Duration::from_secs(1));
        req.dirty = true;
        store.insert(req, &HashSet::new()).unwrap();

        tokio::time::advance(Duration::from_millis(1100)).await;

        assert!(matches!(store.lookup("a"), Lookup::ExpiredDirty(_)));
        assert_eq!(store.remove_expired(), 0);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_expired() {
        let mut store = EntryStore::new(4, EvictionPolicy::Lru).unwrap();
        let mut short = request("short", 1);
        short.ttl = Some(Duration::from_secs(1));
        let mut long = request("long", 1);
        long.ttl = Some(Duration::from_secs(10));
        store.insert(short, &HashSet::new()).unwrap();
        store.insert(long, &HashSet::new()).unwrap();

        tokio::time::advance(Duration::from_millis(1100)).await;

        assert_eq!(store.remove_expired(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.contains("long"));
    }

    #[test]
    fn test_remove_reports_presence() {
        let mut store = EntryStore::new(4, EvictionPolicy::Fifo).unwrap();
        put(&mut store, "a");

        assert!(store.remove("a").is_some());
        assert!(store.remove("a").is_none());
        assert_eq!(store.used(), 0);
    }
}
