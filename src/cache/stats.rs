//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, evictions and
//! write-back flush outcomes.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Stats Collector ==
/// Monotonic counters owned by one engine instance.
///
/// Counters only move forward; `reset` is the single way back to zero.
#[derive(Debug, Default)]
pub struct StatsCollector {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    flush_successes: AtomicU64,
    flush_failures: AtomicU64,
    load_errors: AtomicU64,
    load_timeouts: AtomicU64,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, count: usize) {
        self.evictions.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_expirations(&self, count: usize) {
        self.expirations.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_flush_success(&self) {
        self.flush_successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush_failure(&self) {
        self.flush_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_load_error(&self) {
        self.load_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_load_timeout(&self) {
        self.load_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    // == Snapshot ==
    /// Point-in-time copy of the counters. Gauges are filled in by the caller.
    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            flush_successes: self.flush_successes.load(Ordering::Relaxed),
            flush_failures: self.flush_failures.load(Ordering::Relaxed),
            load_errors: self.load_errors.load(Ordering::Relaxed),
            load_timeouts: self.load_timeouts.load(Ordering::Relaxed),
            ..CacheStats::default()
        }
    }

    // == Reset ==
    /// Zeroes every counter.
    pub fn reset(&self) {
        for counter in [
            &self.hits,
            &self.misses,
            &self.evictions,
            &self.expirations,
            &self.flush_successes,
            &self.flush_failures,
            &self.load_errors,
            &self.load_timeouts,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

// == Cache Stats ==
/// Immutable snapshot of cache performance metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Number of reads served from the cache
    pub hits: u64,
    /// Number of reads not served from the cache (absent or expired)
    pub misses: u64,
    /// Number of entries evicted to make room
    pub evictions: u64,
    /// Number of entries removed because their TTL elapsed
    pub expirations: u64,
    /// Dirty entries successfully written to the backing store
    pub flush_successes: u64,
    /// Dirty entries the backing store rejected
    pub flush_failures: u64,
    /// Backend loads that failed (not counting absent keys)
    pub load_errors: u64,
    /// Waits on an in-flight load that gave up
    pub load_timeouts: u64,
    /// Current number of resident entries
    pub total_entries: usize,
    /// Aggregate size of resident entries
    pub used_capacity: usize,
    /// Resident entries not yet flushed
    pub dirty_entries: usize,
}

impl CacheStats {
    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
