//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL and write-back support.

use std::time::Duration;

use tokio::time::Instant;

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Weight counted against capacity
    pub size: usize,
    /// Creation time, reset when the value is overwritten
    pub created_at: Instant,
    /// Last read or write
    pub last_accessed_at: Instant,
    /// Number of accesses, the insert counts as the first
    pub access_frequency: u64,
    /// Time to live measured from `created_at`, None = no expiration
    pub ttl: Option<Duration>,
    /// Value not yet persisted to the backing store (write-back only)
    pub dirty: bool,
    /// Bumped on every write so a flush can tell whether it wrote the latest value
    pub version: u64,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new clean cache entry with optional TTL.
    pub fn new(value: V, size: usize, ttl: Option<Duration>) -> Self {
        let now = Instant::now();
        Self {
            value,
            size,
            created_at: now,
            last_accessed_at: now,
            access_frequency: 1,
            ttl,
            dirty: false,
            version: 0,
        }
    }

    // == Expires At ==
    /// Absolute expiry instant, if a TTL is set.
    ///
    /// A TTL too large to represent as an instant never expires.
    pub fn expires_at(&self) -> Option<Instant> {
        self.ttl.and_then(|ttl| self.created_at.checked_add(ttl))
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now`.
    ///
    /// An entry expires once `now` is strictly past `created_at + ttl`.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        match self.expires_at() {
            Some(deadline) => now > deadline,
            None => false,
        }
    }

    /// Checks if the entry has expired.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    // == Time To Live ==
    /// Returns remaining TTL, or None if no expiration is set.
    ///
    /// # Returns
    /// - `Some(Duration::ZERO)` if the entry has expired
    /// - `Some(remaining)` if the entry has TTL and hasn't expired
    /// - `None` if the entry has no TTL (never expires)
    pub fn ttl_remaining(&self) -> Option<Duration> {
        self.expires_at()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    // == Record Access ==
    /// Updates recency and frequency bookkeeping for a read.
    pub fn record_access(&mut self) {
        self.last_accessed_at = Instant::now();
        self.access_frequency += 1;
    }

    // == Overwrite ==
    /// Replaces the value in place, restarting its TTL.
    pub fn overwrite(&mut self, value: V, size: usize, ttl: Option<Duration>) {
        let now = Instant::now();
        self.value = value;
        self.size = size;
        self.created_at = now;
        self.last_accessed_at = now;
        self.access_frequency += 1;
        self.ttl = ttl;
        self.version += 1;
    }
}

// == Entry Info ==
/// Read-only view of an entry's metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub size: usize,
    pub dirty: bool,
    pub access_frequency: u64,
    pub ttl_remaining: Option<Duration>,
}

impl<V> From<&CacheEntry<V>> for EntryInfo {
    fn from(entry: &CacheEntry<V>) -> Self {
        Self {
            size: entry.size,
            dirty: entry.dirty,
            access_frequency: entry.access_frequency,
            ttl_remaining: entry.ttl_remaining(),
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_creation_no_ttl() {
        let entry = CacheEntry::new("test_value".to_string(), 1, None);

        assert_eq!(entry.value, "test_value");
        assert!(entry.expires_at().is_none());
        assert!(!entry.is_expired());
        assert!(!entry.dirty);
        assert_eq!(entry.access_frequency, 1);
    }

    #[test]
    fn test_entry_creation_with_ttl() {
        let entry = CacheEntry::new("test_value".to_string(), 1, Some(Duration::from_secs(60)));

        assert!(entry.expires_at().is_some());
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_expiration_boundary_is_strict() {
        let entry = CacheEntry::new("v", 1, Some(Duration::from_secs(1)));
        let deadline = entry.created_at + Duration::from_secs(1);

        assert!(!entry.is_expired_at(deadline));
        assert!(entry.is_expired_at(deadline + Duration::from_millis(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expiration() {
        let entry = CacheEntry::new("v", 1, Some(Duration::from_secs(1)));
        assert!(!entry.is_expired());

        tokio::time::advance(Duration::from_millis(1100)).await;

        assert!(entry.is_expired());
        assert_eq!(entry.ttl_remaining(), Some(Duration::ZERO));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_remaining() {
        let entry = CacheEntry::new("v", 1, Some(Duration::from_secs(10)));
        tokio::time::advance(Duration::from_secs(4)).await;

        assert_eq!(entry.ttl_remaining(), Some(Duration::from_secs(6)));
    }

    #[test]
    fn test_ttl_remaining_no_expiration() {
        let entry = CacheEntry::new("v", 1, None);
        assert!(entry.ttl_remaining().is_none());
    }

    #[test]
    fn test_huge_ttl_never_expires() {
        let entry = CacheEntry::new("v", 1, Some(Duration::from_secs(u64::MAX)));

        assert!(entry.expires_at().is_none());
        assert!(!entry.is_expired());
        assert!(entry.ttl_remaining().is_none());
    }

    #[test]
    fn test_overwrite_bumps_version_and_frequency() {
        let mut entry = CacheEntry::new("a", 1, None);
        entry.record_access();
        entry.overwrite("b", 3, Some(Duration::from_secs(5)));

        assert_eq!(entry.value, "b");
        assert_eq!(entry.size, 3);
        assert_eq!(entry.access_frequency, 3);
        assert_eq!(entry.version, 1);
        assert!(entry.ttl.is_some());
    }
}
