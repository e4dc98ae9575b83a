//! Response DTOs for the cache server API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::{CacheStats, FlushReport};
use crate::config::{EvictionPolicy, WritePolicy};

/// Response body for the GET operation (GET /get/:key)
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    /// The requested key
    pub key: String,
    /// The stored value
    pub value: String,
    /// True if served from the cache, false if loaded from the backing store
    pub hit: bool,
}

impl GetResponse {
    /// Creates a new GetResponse
    pub fn new(key: impl Into<String>, value: impl Into<String>, hit: bool) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            hit,
        }
    }
}

/// Response body for the SET operation (PUT /set)
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    /// Success message
    pub message: String,
    /// The key that was set
    pub key: String,
}

impl SetResponse {
    /// Creates a new SetResponse
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' set successfully", key),
            key,
        }
    }
}

/// Response body for the DELETE operation (DELETE /del/:key)
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    /// Success message
    pub message: String,
    /// The key that was deleted
    pub key: String,
}

impl DeleteResponse {
    /// Creates a new DeleteResponse
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' deleted successfully", key),
            key,
        }
    }
}

/// Response body for POST /invalidate/:key
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    pub key: String,
    /// Whether a cached copy was dropped
    pub was_cached: bool,
}

impl InvalidateResponse {
    pub fn new(key: impl Into<String>, was_cached: bool) -> Self {
        Self {
            key: key.into(),
            was_cached,
        }
    }
}

/// Response body for POST /flush
#[derive(Debug, Clone, Serialize)]
pub struct FlushResponse {
    /// Entries written to the backing store
    pub flushed: usize,
    /// Entries that stayed dirty
    pub failed: usize,
}

impl From<FlushReport> for FlushResponse {
    fn from(report: FlushReport) -> Self {
        Self {
            flushed: report.flushed,
            failed: report.failed,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of evictions
    pub evictions: u64,
    /// Entries removed because their TTL elapsed
    pub expirations: u64,
    /// Successful write-back flushes
    pub flush_successes: u64,
    /// Failed write-back flushes
    pub flush_failures: u64,
    /// Backend loads that failed
    pub load_errors: u64,
    /// Callers that gave up waiting on a load
    pub load_timeouts: u64,
    /// Current number of entries in cache
    pub total_entries: usize,
    /// Aggregate size of resident entries
    pub used_capacity: usize,
    /// Entries not yet written to the backing store
    pub dirty_entries: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    pub eviction_policy: String,
    pub write_policy: String,
}

impl StatsResponse {
    /// Creates a new StatsResponse from a statistics snapshot
    pub fn new(stats: CacheStats, eviction: EvictionPolicy, write: WritePolicy) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
            expirations: stats.expirations,
            flush_successes: stats.flush_successes,
            flush_failures: stats.flush_failures,
            load_errors: stats.load_errors,
            load_timeouts: stats.load_timeouts,
            total_entries: stats.total_entries,
            used_capacity: stats.used_capacity,
            dirty_entries: stats.dirty_entries,
            eviction_policy: eviction.to_string(),
            write_policy: write.to_string(),
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_response_serialize() {
        let resp = GetResponse::new("test_key", "test_value", true);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["key"], "test_key");
        assert_eq!(json["value"], "test_value");
        assert_eq!(json["hit"], true);
    }

    #[test]
    fn test_set_response_serialize() {
        let resp = SetResponse::new("my_key");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("my_key"));
        assert!(json.contains("successfully"));
    }

    #[test]
    fn test_delete_response_serialize() {
        let resp = DeleteResponse::new("deleted_key");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("deleted_key"));
        assert!(json.contains("deleted"));
    }

    #[test]
    fn test_stats_response_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            evictions: 5,
            total_entries: 100,
            ..CacheStats::default()
        };
        let resp = StatsResponse::new(stats, EvictionPolicy::Lfu, WritePolicy::Back);
        assert!((resp.hit_rate - 0.8).abs() < 0.001);
        assert_eq!(resp.eviction_policy, "lfu");
        assert_eq!(resp.write_policy, "back");
    }

    #[test]
    fn test_stats_response_zero_requests() {
        let resp = StatsResponse::new(
            CacheStats::default(),
            EvictionPolicy::Lru,
            WritePolicy::Through,
        );
        assert_eq!(resp.hit_rate, 0.0);
    }

    #[test]
    fn test_flush_response_from_report() {
        let resp = FlushResponse::from(FlushReport {
            flushed: 3,
            failed: 1,
        });
        assert_eq!(resp.flushed, 3);
        assert_eq!(resp.failed, 1);
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy();
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
    }

    #[test]
    fn test_error_response_serialize() {
        let resp = ErrorResponse::new("Something went wrong");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("error"));
        assert!(json.contains("Something went wrong"));
    }
}
