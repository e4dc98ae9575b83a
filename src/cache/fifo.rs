//! FIFO Tracker Module
//!
//! Insertion-order tracking; accesses never reorder keys.

use std::collections::{BTreeMap, HashMap};

// == FIFO Tracker ==
#[derive(Debug, Default)]
pub struct FifoTracker {
    /// Keys ordered by insertion sequence
    queue: BTreeMap<u64, String>,
    /// Insertion sequence of each tracked key
    seqs: HashMap<String, u64>,
    next_seq: u64,
}

impl FifoTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a key. Keys already queued keep their position.
    pub fn insert(&mut self, key: &str) {
        if self.seqs.contains_key(key) {
            return;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.seqs.insert(key.to_string(), seq);
        self.queue.insert(seq, key.to_string());
    }

    pub fn remove(&mut self, key: &str) {
        if let Some(seq) = self.seqs.remove(key) {
            self.queue.remove(&seq);
        }
    }

    /// Keys from oldest to newest insertion.
    pub fn candidates(&self) -> impl Iterator<Item = &str> {
        self.queue.values().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.seqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seqs.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.seqs.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_keeps_insertion_order() {
        let mut fifo = FifoTracker::new();
        fifo.insert("A");
        fifo.insert("B");
        fifo.insert("C");
        // Re-inserting does not move A
        fifo.insert("A");

        assert_eq!(fifo.len(), 3);
        assert_eq!(fifo.candidates().collect::<Vec<_>>(), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_fifo_remove_then_insert_goes_to_back() {
        let mut fifo = FifoTracker::new();
        fifo.insert("A");
        fifo.insert("B");
        fifo.remove("A");
        fifo.insert("A");

        assert!(fifo.contains("A"));
        assert_eq!(fifo.candidates().collect::<Vec<_>>(), vec!["B", "A"]);
    }
}
