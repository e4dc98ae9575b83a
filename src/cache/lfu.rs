//! LFU Tracker Module
//!
//! Implements Least Frequently Used tracking for cache eviction.
//! Among keys with equal frequency, the earliest inserted is evicted first.

use std::collections::{BTreeMap, HashMap};

/// Ordering rank: (access frequency, insertion sequence).
type Rank = (u64, u64);

// == LFU Tracker ==
/// Tracks access frequency for LFU eviction strategy.
#[derive(Debug, Default)]
pub struct LfuTracker {
    /// Keys ordered by (frequency, insertion sequence)
    order: BTreeMap<Rank, String>,
    /// Current rank of each tracked key
    ranks: HashMap<String, Rank>,
    /// Next insertion sequence number
    next_seq: u64,
}

impl LfuTracker {
    pub fn new() -> Self {
        Self::default()
    }

    // == Insert ==
    /// Registers a new key with frequency 1.
    ///
    /// A key that is already tracked is treated as an access.
    pub fn insert(&mut self, key: &str) {
        if self.ranks.contains_key(key) {
            self.increment(key);
            return;
        }
        let rank = (1, self.next_seq);
        self.next_seq += 1;
        self.ranks.insert(key.to_string(), rank);
        self.order.insert(rank, key.to_string());
    }

    // == Increment ==
    /// Counts one access, keeping the original insertion sequence.
    pub fn increment(&mut self, key: &str) {
        if let Some(rank) = self.ranks.get_mut(key) {
            if let Some(k) = self.order.remove(&*rank) {
                rank.0 += 1;
                self.order.insert(*rank, k);
            }
        }
    }

    pub fn remove(&mut self, key: &str) {
        if let Some(rank) = self.ranks.remove(key) {
            self.order.remove(&rank);
        }
    }

    // == Candidates ==
    /// Keys from lowest to highest frequency, oldest insertion first on ties.
    pub fn candidates(&self) -> impl Iterator<Item = &str> {
        self.order.values().map(String::as_str)
    }

    /// Current access frequency of a key.
    pub fn frequency(&self, key: &str) -> Option<u64> {
        self.ranks.get(key).map(|rank| rank.0)
    }

    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.ranks.contains_key(key)
    }
}
