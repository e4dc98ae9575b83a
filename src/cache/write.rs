//! Write Policy Coordinator
//!
//! Decides how writes travel between the entry store and the backing store,
//! and owns every path that flushes dirty entries: the periodic batch, the
//! synchronous flush of dirty eviction victims, and the final drain.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::backend::BackingStore;
use crate::cache::{
    DirtySnapshot, EntryStore, InsertRequest, Insertion, KeyLocks, StatsCollector,
};
use crate::config::WritePolicy;
use crate::error::{CacheError, Result};

/// Upper bound on flush-then-retry rounds for a single insert. Each round
/// either cleans or pins at least one victim unless a victim is rewritten
/// concurrently, so this only bounds that pathological case.
const MAX_EVICTION_ROUNDS: usize = 8;

// == Flush Report ==
/// Outcome of one flush pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    /// Entries written and marked clean
    pub flushed: usize,
    /// Entries the backend rejected; still dirty
    pub failed: usize,
}

impl FlushReport {
    fn absorb(&mut self, other: FlushReport) {
        self.flushed += other.flushed;
        self.failed += other.failed;
    }
}

// == Write Coordinator ==
pub struct WriteCoordinator<V> {
    policy: WritePolicy,
    backend: Arc<dyn BackingStore<V>>,
    locks: KeyLocks,
    max_flush_batch: usize,
}

impl<V> WriteCoordinator<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(
        policy: WritePolicy,
        backend: Arc<dyn BackingStore<V>>,
        max_flush_batch: usize,
    ) -> Self {
        Self {
            policy,
            backend,
            locks: KeyLocks::new(),
            max_flush_batch,
        }
    }

    pub fn policy(&self) -> WritePolicy {
        self.policy
    }

    pub fn backend(&self) -> &Arc<dyn BackingStore<V>> {
        &self.backend
    }

    pub fn locks(&self) -> &KeyLocks {
        &self.locks
    }

    // == Put ==
    /// Propagates a write according to the configured policy.
    ///
    /// The caller must hold the key's write lock.
    pub async fn put(
        &self,
        store: &Mutex<EntryStore<V>>,
        stats: &StatsCollector,
        key: &str,
        value: V,
        size: usize,
        ttl: Option<Duration>,
    ) -> Result<()> {
        match self.policy {
            WritePolicy::Through => {
                // Reject before touching the backend so nothing changes
                let capacity = store.lock().capacity();
                if size > capacity {
                    return Err(CacheError::EntryTooLarge {
                        key: key.to_string(),
                        size,
                        capacity,
                    });
                }

                // The cache is only updated once the backend acknowledged,
                // so a failed write leaves the previous state in place.
                self.backend
                    .store(key, &value)
                    .await
                    .map_err(|e| CacheError::BackendWriteFailed(e.to_string()))?;

                self.commit(store, stats, insert_request(key, value, size, ttl, false))
                    .await
                    .map(|_| ())
            }
            WritePolicy::Back => self
                .commit(store, stats, insert_request(key, value, size, ttl, true))
                .await
                .map(|_| ()),
            WritePolicy::Around => {
                self.backend
                    .store(key, &value)
                    .await
                    .map_err(|e| CacheError::BackendWriteFailed(e.to_string()))?;

                if store.lock().discard(key).is_some() {
                    debug!(key, "Invalidated cached copy after write-around");
                }
                Ok(())
            }
        }
    }

    // == Populate ==
    /// Caches a value built with [`InsertRequest::loaded`]. Nothing is cached
    /// if the key became resident or was written, deleted or invalidated
    /// since the load began. Returns true if the value was cached.
    pub async fn populate(
        &self,
        store: &Mutex<EntryStore<V>>,
        stats: &StatsCollector,
        request: InsertRequest<V>,
    ) -> Result<bool> {
        self.commit(store, stats, request).await
    }

    // == Commit ==
    /// Inserts into the store, flushing dirty victims synchronously first.
    ///
    /// A victim whose flush fails stays resident and dirty; it is pinned so
    /// the next attempt picks a different victim, and the flush cycle retries
    /// it later.
    async fn commit(
        &self,
        store: &Mutex<EntryStore<V>>,
        stats: &StatsCollector,
        request: InsertRequest<V>,
    ) -> Result<bool> {
        let mut pinned = HashSet::new();

        for _ in 0..MAX_EVICTION_ROUNDS {
            let outcome = store.lock().insert(request.clone(), &pinned)?;
            match outcome {
                Insertion::Inserted { evicted } => {
                    if !evicted.is_empty() {
                        debug!(key = %request.key, ?evicted, "Evicted entries to make room");
                        stats.record_evictions(evicted.len());
                    }
                    return Ok(true);
                }
                Insertion::Skipped => return Ok(false),
                Insertion::BlockedByDirty(victims) => {
                    for victim in victims {
                        // Someone else is writing this key; leave it alone.
                        let Some(_guard) = self.locks.try_lock(&victim.key) else {
                            pinned.insert(victim.key);
                            continue;
                        };
                        let Some(current) = store.lock().dirty_snapshot(&victim.key) else {
                            continue;
                        };
                        if !self.flush_entry(store, stats, current).await {
                            pinned.insert(victim.key);
                        }
                    }
                }
            }
        }

        Err(CacheError::CacheFull(format!(
            "dirty entries kept blocking insertion of '{}'",
            request.key
        )))
    }

    // == Delete ==
    /// Removes a key from the backing store, then from the cache.
    ///
    /// The caller must hold the key's write lock. Deleting an absent key is a no-op.
    pub async fn delete(&self, store: &Mutex<EntryStore<V>>, key: &str) -> Result<()> {
        self.backend
            .delete_remote(key)
            .await
            .map_err(|e| CacheError::BackendUnavailable(e.to_string()))?;
        store.lock().discard(key);
        Ok(())
    }

    // == Invalidate ==
    /// Drops the cached copy of a key without touching the backend value.
    ///
    /// A dirty entry is flushed first; if that fails it stays resident and
    /// the failure is returned. The caller must hold the key's write lock.
    pub async fn invalidate(
        &self,
        store: &Mutex<EntryStore<V>>,
        stats: &StatsCollector,
        key: &str,
    ) -> Result<bool> {
        let dirty = store.lock().dirty_snapshot(key);
        if let Some(snapshot) = dirty {
            if !self.flush_entry(store, stats, snapshot).await {
                return Err(CacheError::BackendWriteFailed(format!(
                    "could not flush '{}' before invalidating it",
                    key
                )));
            }
        }
        Ok(store.lock().discard(key).is_some())
    }

    // == Flush Batch ==
    /// Writes up to `max_flush_batch` dirty entries to the backend.
    ///
    /// Only the key being written is locked during each backend call.
    pub async fn flush_batch(
        &self,
        store: &Mutex<EntryStore<V>>,
        stats: &StatsCollector,
    ) -> FlushReport {
        let batch = store.lock().dirty_batch(self.max_flush_batch);
        let mut report = FlushReport::default();

        for candidate in batch {
            let _guard = self.locks.lock(&candidate.key).await;
            // Re-read under the key lock: the entry may have been rewritten,
            // deleted or flushed since the batch was taken.
            let Some(current) = store.lock().dirty_snapshot(&candidate.key) else {
                continue;
            };
            if self.flush_entry(store, stats, current).await {
                report.flushed += 1;
            } else {
                report.failed += 1;
            }
        }

        report
    }

    // == Flush All ==
    /// Flushes until nothing is dirty or a pass makes no progress.
    pub async fn flush_all(
        &self,
        store: &Mutex<EntryStore<V>>,
        stats: &StatsCollector,
    ) -> FlushReport {
        let mut total = FlushReport::default();
        loop {
            let report = self.flush_batch(store, stats).await;
            total.absorb(report);
            if report.flushed == 0 || store.lock().dirty_count() == 0 {
                return total;
            }
        }
    }

    /// Writes one snapshot; true if the entry is now clean.
    pub async fn flush_entry(
        &self,
        store: &Mutex<EntryStore<V>>,
        stats: &StatsCollector,
        snapshot: DirtySnapshot<V>,
    ) -> bool {
        match self.backend.store(&snapshot.key, &snapshot.value).await {
            Ok(()) => {
                stats.record_flush_success();
                store.lock().mark_clean(&snapshot.key, snapshot.version)
            }
            Err(e) => {
                stats.record_flush_failure();
                let failure = CacheError::FlushFailed {
                    key: snapshot.key,
                    reason: e.to_string(),
                };
                warn!(error = %failure, "Write-back flush failed, entry stays dirty");
                false
            }
        }
    }
}

fn insert_request<V>(
    key: &str,
    value: V,
    size: usize,
    ttl: Option<Duration>,
    dirty: bool,
) -> InsertRequest<V> {
    InsertRequest {
        key: key.to_string(),
        value,
        size,
        ttl,
        dirty,
        load_ticket: None,
    }
}
