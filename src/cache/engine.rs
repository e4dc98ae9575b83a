//! Cache Engine Module
//!
//! Facade composing the entry store, eviction tracker, TTL handling, write
//! coordinator, stampede guard and statistics behind Get/Put/Delete.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backend::BackingStore;
use crate::cache::{
    CacheStats, EntryInfo, EntryStore, FlushReport, InsertRequest, Join, Lookup, StampedeGuard,
    StatsCollector, WriteCoordinator,
};
use crate::config::{CapacityUnit, Config, EvictionPolicy, WritePolicy};
use crate::error::{CacheError, Result};
use crate::tasks::{spawn_flush_task, spawn_sweep_task, BackgroundTasks};

/// Computes the capacity weight of an entry.
pub type Weigher<V> = Arc<dyn Fn(&str, &V) -> usize + Send + Sync>;

/// Every entry weighs 1.
pub fn unit_weigher<V>() -> Weigher<V> {
    Arc::new(|_, _| 1)
}

/// Entries weigh their key plus value length in bytes.
pub fn byte_weigher<V: AsRef<[u8]>>() -> Weigher<V> {
    Arc::new(|key, value| key.len() + value.as_ref().len())
}

// == Get Outcome ==
/// Result of a successful Get.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetOutcome<V> {
    pub value: V,
    /// True if served from the cache without a backend load
    pub hit: bool,
}

// == Shutdown Report ==
/// What happened during a graceful shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    /// Final flush outcome
    pub flush: FlushReport,
    /// In-flight loads still running when the drain timed out
    pub abandoned_loads: usize,
}

pub(crate) struct EngineInner<V> {
    config: Config,
    store: Mutex<EntryStore<V>>,
    stats: StatsCollector,
    coordinator: WriteCoordinator<V>,
    guard: StampedeGuard<V>,
    weigher: Weigher<V>,
    tasks: Mutex<Option<BackgroundTasks>>,
}

// == Cache Engine ==
/// Shared handle to one cache instance. Cloning is cheap.
pub struct CacheEngine<V> {
    inner: Arc<EngineInner<V>>,
}

impl<V> Clone for CacheEngine<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl CacheEngine<String> {
    /// Builds a string cache whose weigher follows `config.capacity_unit`.
    pub fn for_strings(config: Config, backend: Arc<dyn BackingStore<String>>) -> Result<Self> {
        let weigher = match config.capacity_unit {
            CapacityUnit::Entries => unit_weigher(),
            CapacityUnit::Bytes => byte_weigher(),
        };
        Self::with_weigher(config, backend, weigher)
    }
}

impl<V> CacheEngine<V>
where
    V: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates an engine where every entry weighs 1.
    ///
    /// Background tasks are not running until [`CacheEngine::start`] is called.
    ///
    /// # Errors
    /// `CapacityMisconfigured` if capacity is zero.
    pub fn new(config: Config, backend: Arc<dyn BackingStore<V>>) -> Result<Self> {
        Self::with_weigher(config, backend, unit_weigher())
    }

    /// Creates an engine with a custom entry weigher.
    pub fn with_weigher(
        config: Config,
        backend: Arc<dyn BackingStore<V>>,
        weigher: Weigher<V>,
    ) -> Result<Self> {
        config.validate()?;
        let store = EntryStore::new(config.capacity, config.eviction_policy)?;
        let coordinator =
            WriteCoordinator::new(config.write_policy, backend, config.max_flush_batch);

        info!(
            capacity = config.capacity,
            eviction = %config.eviction_policy,
            write = %config.write_policy,
            "Cache engine created"
        );

        Ok(Self {
            inner: Arc::new(EngineInner {
                config,
                store: Mutex::new(store),
                stats: StatsCollector::new(),
                coordinator,
                guard: StampedeGuard::new(),
                weigher,
                tasks: Mutex::new(None),
            }),
        })
    }

    // == Get ==
    /// Reads a key, loading it from the backing store on a miss.
    ///
    /// Concurrent misses for the same key share one backend load.
    ///
    /// # Errors
    /// - `NotFound` if the backing store has no value
    /// - `BackendUnavailable` if the load failed
    /// - `LoadTimeout` if the shared load did not finish within `load_timeout`
    pub async fn get(&self, key: &str) -> Result<GetOutcome<V>> {
        let inner = &self.inner;
        let lookup = inner.store.lock().lookup(key);

        match lookup {
            Lookup::Hit(value) => {
                inner.stats.record_hit();
                return Ok(GetOutcome { value, hit: true });
            }
            Lookup::Miss => inner.stats.record_miss(),
            Lookup::Expired => {
                inner.stats.record_miss();
                inner.stats.record_expirations(1);
            }
            Lookup::ExpiredDirty(_) => {
                inner.stats.record_miss();
                if let Some(value) = self.retire_expired_dirty(key).await {
                    return Ok(GetOutcome { value, hit: false });
                }
            }
        }

        let value = self.load_through(key).await?;
        Ok(GetOutcome { value, hit: false })
    }

    /// An expired entry still holding unflushed data must reach the backend
    /// before it can leave the cache. If that flush fails the unflushed value
    /// is returned, since the backend copy is older.
    async fn retire_expired_dirty(&self, key: &str) -> Option<V> {
        let inner = &self.inner;
        let _guard = inner.coordinator.locks().lock(key).await;
        let snapshot = inner.store.lock().dirty_snapshot(key);
        if let Some(snapshot) = snapshot {
            let value = snapshot.value.clone();
            if !inner
                .coordinator
                .flush_entry(&inner.store, &inner.stats, snapshot)
                .await
            {
                return Some(value);
            }
        }
        if inner.store.lock().remove_if_expired(key) {
            inner.stats.record_expirations(1);
        }
        None
    }

    async fn load_through(&self, key: &str) -> Result<V> {
        let inner = &self.inner;
        let join = inner.guard.join(
            key,
            || match inner.store.lock().lookup(key) {
                Lookup::Hit(value) => Some(value),
                Lookup::Expired => {
                    inner.stats.record_expirations(1);
                    None
                }
                Lookup::Miss | Lookup::ExpiredDirty(_) => None,
            },
            || {
                let inner = Arc::clone(&self.inner);
                let key = key.to_string();
                async move { inner.load_and_populate(&key).await }
            },
        );

        match join {
            Join::Ready(value) => Ok(value),
            Join::Wait { load, leader } => {
                debug!(key, leader, "Waiting on backend load");
                let result = StampedeGuard::wait(key, load, inner.config.load_timeout).await;
                if matches!(result, Err(CacheError::LoadTimeout { .. })) {
                    inner.stats.record_load_timeout();
                }
                result
            }
        }
    }

    // == Put ==
    /// Writes a value according to the configured write policy.
    ///
    /// `ttl` overrides the configured default; a zero TTL means no expiry.
    ///
    /// # Errors
    /// - `EntryTooLarge` if the entry can never fit (nothing is changed)
    /// - `BackendWriteFailed` under write-through or write-around
    /// - `CacheFull` under write-back when dirty victims cannot be flushed
    pub async fn put(&self, key: &str, value: V, ttl: Option<Duration>) -> Result<()> {
        let inner = &self.inner;
        let ttl = ttl.or(inner.config.default_ttl).filter(|ttl| !ttl.is_zero());
        let size = (inner.weigher)(key, &value);

        let _guard = inner.coordinator.locks().lock(key).await;
        inner
            .coordinator
            .put(&inner.store, &inner.stats, key, value, size, ttl)
            .await
    }

    // == Delete ==
    /// Removes a key from the backing store and the cache.
    ///
    /// Deleting an absent key succeeds.
    pub async fn delete(&self, key: &str) -> Result<()> {
        let inner = &self.inner;
        let _guard = inner.coordinator.locks().lock(key).await;
        inner.coordinator.delete(&inner.store, key).await
    }

    // == Invalidate ==
    /// Drops the cached copy of a key so the next Get reloads it.
    ///
    /// Returns whether a copy was resident. Dirty entries are flushed first.
    pub async fn invalidate(&self, key: &str) -> Result<bool> {
        let inner = &self.inner;
        let _guard = inner.coordinator.locks().lock(key).await;
        inner
            .coordinator
            .invalidate(&inner.store, &inner.stats, key)
            .await
    }

    // == Stats ==
    /// Point-in-time statistics snapshot.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.inner.stats.snapshot();
        let store = self.inner.store.lock();
        stats.total_entries = store.len();
        stats.used_capacity = store.used();
        stats.dirty_entries = store.dirty_count();
        stats
    }

    /// Zeroes all counters.
    pub fn reset_stats(&self) {
        self.inner.stats.reset();
    }

    // == Maintenance ==
    /// Runs one write-back flush batch now.
    pub async fn flush_dirty(&self) -> FlushReport {
        let inner = &self.inner;
        let report = inner.coordinator.flush_batch(&inner.store, &inner.stats).await;
        if report.failed > 0 {
            warn!(
                flushed = report.flushed,
                failed = report.failed,
                "Flush cycle left entries dirty"
            );
        }
        report
    }

    /// Removes expired entries now. Returns the number removed.
    pub fn sweep_expired(&self) -> usize {
        let removed = self.inner.store.lock().remove_expired();
        self.inner.stats.record_expirations(removed);
        removed
    }

    // == Introspection ==
    /// Metadata of a live entry, without touching eviction order or stats.
    pub fn peek(&self, key: &str) -> Option<EntryInfo> {
        self.inner.store.lock().peek(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.store.lock().contains(key)
    }

    /// Resident keys in eviction order, next victim first.
    pub fn keys_in_eviction_order(&self) -> Vec<String> {
        self.inner.store.lock().keys_in_eviction_order()
    }

    /// Number of resident entries, including expired ones not yet removed.
    pub fn len(&self) -> usize {
        self.inner.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.store.lock().is_empty()
    }

    pub fn used_capacity(&self) -> usize {
        self.inner.store.lock().used()
    }

    pub fn dirty_count(&self) -> usize {
        self.inner.store.lock().dirty_count()
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn eviction_policy(&self) -> EvictionPolicy {
        self.inner.config.eviction_policy
    }

    pub fn write_policy(&self) -> WritePolicy {
        self.inner.coordinator.policy()
    }

    // == Lifecycle ==
    /// Starts the TTL sweep and write-back flush tasks. Calling it again is a no-op.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) {
        let mut tasks = self.inner.tasks.lock();
        if tasks.is_some() {
            return;
        }

        let mut background = BackgroundTasks::new();
        let config = &self.inner.config;
        if !config.sweep_interval.is_zero() {
            let handle = spawn_sweep_task(self.clone(), config.sweep_interval, background.subscribe());
            background.push(handle);
        }
        if config.write_policy == WritePolicy::Back && !config.flush_interval.is_zero() {
            let handle = spawn_flush_task(self.clone(), config.flush_interval, background.subscribe());
            background.push(handle);
        }

        info!(tasks = background.len(), "Background tasks started");
        *tasks = Some(background);
    }

    // == Shutdown ==
    /// Stops background tasks, drains in-flight loads and flushes every dirty entry.
    ///
    /// Loads still running after `load_timeout` are abandoned. Entries whose
    /// final flush fails remain dirty and are reported; their data is lost
    /// when the process exits.
    pub async fn shutdown(&self) -> ShutdownReport {
        let inner = &self.inner;
        let tasks = inner.tasks.lock().take();
        if let Some(tasks) = tasks {
            tasks.stop().await;
        }

        let pending = inner.guard.pending();
        let mut report = ShutdownReport::default();
        if !pending.is_empty() {
            debug!(loads = pending.len(), "Draining in-flight loads");
            if tokio::time::timeout(inner.config.load_timeout, join_all(pending))
                .await
                .is_err()
            {
                report.abandoned_loads = inner.guard.in_flight_count();
                warn!(abandoned = report.abandoned_loads, "In-flight loads did not finish");
            }
        }

        report.flush = inner.coordinator.flush_all(&inner.store, &inner.stats).await;
        if report.flush.failed > 0 {
            warn!(
                failed = report.flush.failed,
                "Dirty entries could not be flushed at shutdown"
            );
        }
        info!(flushed = report.flush.flushed, "Cache engine shut down");
        report
    }
}

impl<V> EngineInner<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Body of a coalesced load: fetch, then cache unless the key was
    /// written, deleted or invalidated while the backend call ran.
    async fn load_and_populate(self: Arc<Self>, key: &str) -> Result<V> {
        let ticket = self.store.lock().begin_load(key);
        let _release = LoadRelease {
            inner: &*self,
            key,
            ticket,
        };

        match self.coordinator.backend().load(key).await {
            Ok(Some(value)) => {
                self.populate(key, value.clone(), ticket).await;
                Ok(value)
            }
            Ok(None) => Err(CacheError::NotFound(key.to_string())),
            Err(e) => {
                self.stats.record_load_error();
                warn!(key, error = %e, "Backend load failed");
                Err(CacheError::BackendUnavailable(e.to_string()))
            }
        }
    }

    async fn populate(&self, key: &str, value: V, ticket: u64) {
        let size = (self.weigher)(key, &value);
        let ttl = self.config.default_ttl.filter(|ttl| !ttl.is_zero());
        let request = InsertRequest::loaded(key, value, size, ttl, ticket);
        match self
            .coordinator
            .populate(&self.store, &self.stats, request)
            .await
        {
            Ok(true) => {}
            Ok(false) => debug!(key, "Loaded value superseded, not cached"),
            Err(e) => warn!(key, error = %e, "Loaded value was not cached"),
        }
    }
}

/// Ends a load when its body finishes or unwinds: drops the store ticket and
/// the stampede table entry so the next miss starts a fresh load.
struct LoadRelease<'a, V>
where
    V: Clone + Send + Sync + 'static,
{
    inner: &'a EngineInner<V>,
    key: &'a str,
    ticket: u64,
}

impl<V> Drop for LoadRelease<'_, V>
where
    V: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.inner.store.lock().end_load(self.key, self.ticket);
        self.inner.guard.complete(self.key);
    }
}
