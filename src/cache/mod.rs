//! Cache Module
//!
//! In-process cache engine with pluggable eviction (LRU, LFU, FIFO), write
//! policies (write-through, write-back, write-around), TTL expiry and
//! coalesced backend loads.

mod engine;
mod entry;
mod fifo;
mod guard;
mod lfu;
mod locks;
mod lru;
mod policy;
mod stats;
mod store;
mod write;


// Re-export public types
pub use engine::{byte_weigher, unit_weigher, CacheEngine, GetOutcome, ShutdownReport, Weigher};
pub use entry::{CacheEntry, EntryInfo};
pub use fifo::FifoTracker;
pub use guard::{Join, SharedLoad, StampedeGuard};
pub use lfu::LfuTracker;
pub use locks::{KeyGuard, KeyLocks};
pub use lru::LruTracker;
pub use policy::EvictionTracker;
pub use stats::{CacheStats, StatsCollector};
pub use store::{DirtySnapshot, EntryStore, InsertRequest, Insertion, Lookup};
pub use write::{FlushReport, WriteCoordinator};

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Maximum allowed value size in bytes
pub const MAX_VALUE_SIZE: usize = 1024 * 1024; // 1 MB

/// Maximum TTL accepted from clients, in seconds
pub const MAX_TTL_SECS: u64 = 365 * 24 * 60 * 60; // 1 year
