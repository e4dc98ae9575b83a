//! Backing Store Module
//!
//! The narrow load/store/delete contract the cache engine uses to reach the
//! system of record, plus an in-memory implementation.

mod memory;

pub use memory::InMemoryBackend;

use async_trait::async_trait;
use thiserror::Error;

// == Backend Error ==
/// Failure reported by a backing store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct BackendError(pub String);

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

// == Backing Store ==
/// External system of record behind the cache.
///
/// The cache never assumes the store is coherent with other writers.
#[async_trait]
pub trait BackingStore<V>: Send + Sync {
    /// Loads a value; `Ok(None)` means the key does not exist.
    async fn load(&self, key: &str) -> Result<Option<V>, BackendError>;

    /// Persists a value.
    async fn store(&self, key: &str, value: &V) -> Result<(), BackendError>;

    /// Removes a value. Removing an absent key succeeds.
    async fn delete_remote(&self, key: &str) -> Result<(), BackendError>;
}
