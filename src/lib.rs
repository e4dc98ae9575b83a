//! Cache Engine - an in-process read-through cache with pluggable policies
//!
//! Sits between callers and a slower backing store. Supports LRU, LFU and
//! FIFO eviction, write-through, write-back and write-around writes, TTL
//! expiry and coalescing of concurrent misses. An HTTP surface exposes the
//! engine as a small cache server.

pub mod api;
pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use backend::{BackendError, BackingStore, InMemoryBackend};
pub use cache::{CacheEngine, CacheStats, FlushReport, GetOutcome, ShutdownReport};
pub use config::{CapacityUnit, Config, EvictionPolicy, WritePolicy};
pub use error::{CacheError, Result};
