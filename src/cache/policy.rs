//! Eviction Policy Module
//!
//! Closed set of eviction trackers selected once at construction.

use crate::config::EvictionPolicy;

use super::{FifoTracker, LfuTracker, LruTracker};

// == Eviction Tracker ==
/// Ordering metadata for the configured eviction policy.
///
/// Every resident key is registered in exactly one tracker.
#[derive(Debug)]
pub enum EvictionTracker {
    Lru(LruTracker),
    Lfu(LfuTracker),
    Fifo(FifoTracker),
}

impl EvictionTracker {
    pub fn new(policy: EvictionPolicy) -> Self {
        match policy {
            EvictionPolicy::Lru => Self::Lru(LruTracker::new()),
            EvictionPolicy::Lfu => Self::Lfu(LfuTracker::new()),
            EvictionPolicy::Fifo => Self::Fifo(FifoTracker::new()),
        }
    }

    pub fn policy(&self) -> EvictionPolicy {
        match self {
            Self::Lru(_) => EvictionPolicy::Lru,
            Self::Lfu(_) => EvictionPolicy::Lfu,
            Self::Fifo(_) => EvictionPolicy::Fifo,
        }
    }

    // == On Insert ==
    /// Registers a key that just became resident.
    pub fn on_insert(&mut self, key: &str) {
        match self {
            Self::Lru(t) => t.touch(key),
            Self::Lfu(t) => t.insert(key),
            Self::Fifo(t) => t.insert(key),
        }
    }

    // == On Access ==
    /// Records a read hit or an in-place overwrite.
    pub fn on_access(&mut self, key: &str) {
        match self {
            Self::Lru(t) => t.touch(key),
            Self::Lfu(t) => t.increment(key),
            Self::Fifo(_) => {}
        }
    }

    pub fn remove(&mut self, key: &str) {
        match self {
            Self::Lru(t) => t.remove(key),
            Self::Lfu(t) => t.remove(key),
            Self::Fifo(t) => t.remove(key),
        }
    }

    // == Candidates ==
    /// Resident keys in eviction order, next victim first.
    pub fn candidates(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        match self {
            Self::Lru(t) => Box::new(t.candidates()),
            Self::Lfu(t) => Box::new(t.candidates()),
            Self::Fifo(t) => Box::new(t.candidates()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Lru(t) => t.len(),
            Self::Lfu(t) => t.len(),
            Self::Fifo(t) => t.len(),
        }
    }
}
