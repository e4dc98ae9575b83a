//! In-Memory Backing Store
//!
//! HashMap-backed store with call counters, optional latency and failure
//! injection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{BackendError, BackingStore};

/// In-memory backing store.
pub struct InMemoryBackend<V> {
    data: RwLock<HashMap<String, V>>,
    latency: RwLock<Duration>,
    fail_loads: AtomicBool,
    fail_stores: AtomicBool,
    fail_deletes: AtomicBool,
    loads: AtomicU64,
    stores: AtomicU64,
    deletes: AtomicU64,
}

impl<V> Default for InMemoryBackend<V> {
    fn default() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            latency: RwLock::new(Duration::ZERO),
            fail_loads: AtomicBool::new(false),
            fail_stores: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            loads: AtomicU64::new(0),
            stores: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
        }
    }
}

impl<V: Clone> InMemoryBackend<V> {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay applied to every operation
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.write() = latency;
        self
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.write() = latency;
    }

    // == Direct Access ==
    // These bypass counters and failure injection.

    /// Seeds a value
    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.data.write().insert(key.into(), value);
    }

    /// Reads a value
    pub fn get(&self, key: &str) -> Option<V> {
        self.data.read().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    // == Failure Injection ==

    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_stores(&self, fail: bool) {
        self.fail_stores.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    // == Call Counters ==

    pub fn load_count(&self) -> u64 {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn store_count(&self) -> u64 {
        self.stores.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> u64 {
        self.deletes.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        let latency = *self.latency.read();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl<V> BackingStore<V> for InMemoryBackend<V>
where
    V: Clone + Send + Sync,
{
    async fn load(&self, key: &str) -> Result<Option<V>, BackendError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(BackendError::new(format!("load of '{}' refused", key)));
        }
        Ok(self.get(key))
    }

    async fn store(&self, key: &str, value: &V) -> Result<(), BackendError> {
        self.stores.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if self.fail_stores.load(Ordering::SeqCst) {
            return Err(BackendError::new(format!("store of '{}' refused", key)));
        }
        self.insert(key, value.clone());
        Ok(())
    }

    async fn delete_remote(&self, key: &str) -> Result<(), BackendError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(BackendError::new(format!("delete of '{}' refused", key)));
        }
        self.data.write().remove(key);
        Ok(())
    }
}
