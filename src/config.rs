//! Configuration Module
//!
//! Handles loading and validating engine and server configuration.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

// == Eviction Policy ==
/// Rule selecting which entry leaves when capacity is exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// Least recently used
    #[default]
    Lru,
    /// Least frequently used, oldest insertion first among equal frequencies
    Lfu,
    /// First in, first out
    Fifo,
}

impl FromStr for EvictionPolicy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lru" => Ok(Self::Lru),
            "lfu" => Ok(Self::Lfu),
            "fifo" => Ok(Self::Fifo),
            other => Err(CacheError::InvalidRequest(format!(
                "Unknown eviction policy '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lru => write!(f, "lru"),
            Self::Lfu => write!(f, "lfu"),
            Self::Fifo => write!(f, "fifo"),
        }
    }
}

// == Write Policy ==
/// How a Put is propagated between the cache and the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WritePolicy {
    /// Synchronous dual write; rolled back if the backend rejects it
    #[default]
    Through,
    /// Cache-only write marked dirty, flushed later
    Back,
    /// Backend-only write; any cached copy is invalidated
    Around,
}

impl FromStr for WritePolicy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "through" | "write-through" => Ok(Self::Through),
            "back" | "write-back" => Ok(Self::Back),
            "around" | "write-around" => Ok(Self::Around),
            other => Err(CacheError::InvalidRequest(format!(
                "Unknown write policy '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for WritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Through => write!(f, "through"),
            Self::Back => write!(f, "back"),
            Self::Around => write!(f, "around"),
        }
    }
}

// == Capacity Unit ==
/// Unit in which entry sizes and capacity are measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapacityUnit {
    /// Every entry weighs 1
    #[default]
    Entries,
    /// Entries weigh their byte length
    Bytes,
}

impl FromStr for CapacityUnit {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "entries" | "count" => Ok(Self::Entries),
            "bytes" => Ok(Self::Bytes),
            other => Err(CacheError::InvalidRequest(format!(
                "Unknown capacity unit '{}'",
                other
            ))),
        }
    }
}

// == Config ==
/// Engine and server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum aggregate size of resident entries
    pub capacity: usize,
    /// Unit in which `capacity` is measured
    pub capacity_unit: CapacityUnit,
    /// Eviction rule
    pub eviction_policy: EvictionPolicy,
    /// Write propagation rule
    pub write_policy: WritePolicy,
    /// TTL applied to Puts without an explicit TTL, None = no expiry
    pub default_ttl: Option<Duration>,
    /// Write-back flush cycle interval, zero disables the task
    pub flush_interval: Duration,
    /// Maximum dirty entries written per flush cycle
    pub max_flush_batch: usize,
    /// TTL sweep interval, zero disables the task
    pub sweep_interval: Duration,
    /// How long a caller waits on an in-flight load
    pub load_timeout: Duration,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_CAPACITY` - Capacity in `CAPACITY_UNIT`s (default: 1000)
    /// - `CAPACITY_UNIT` - `entries` or `bytes` (default: entries)
    /// - `EVICTION_POLICY` - `lru`, `lfu` or `fifo` (default: lru)
    /// - `WRITE_POLICY` - `through`, `back` or `around` (default: through)
    /// - `DEFAULT_TTL` - Default TTL in seconds, 0 = none (default: 300)
    /// - `FLUSH_INTERVAL_MS` - Write-back flush interval (default: 1000)
    /// - `MAX_FLUSH_BATCH` - Dirty entries per flush cycle (default: 100)
    /// - `SWEEP_INTERVAL_MS` - TTL sweep interval (default: 1000)
    /// - `LOAD_TIMEOUT_MS` - Coalesced load wait limit (default: 5000)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    ///
    /// Unparsable numbers fall back to their defaults; unknown policy names are errors.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let default_ttl = match env_number::<u64>("DEFAULT_TTL") {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.default_ttl,
        };

        Ok(Self {
            capacity: env_number("CACHE_CAPACITY").unwrap_or(defaults.capacity),
            capacity_unit: env_parsed("CAPACITY_UNIT")?.unwrap_or(defaults.capacity_unit),
            eviction_policy: env_parsed("EVICTION_POLICY")?.unwrap_or(defaults.eviction_policy),
            write_policy: env_parsed("WRITE_POLICY")?.unwrap_or(defaults.write_policy),
            default_ttl,
            flush_interval: env_number("FLUSH_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.flush_interval),
            max_flush_batch: env_number("MAX_FLUSH_BATCH").unwrap_or(defaults.max_flush_batch),
            sweep_interval: env_number("SWEEP_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.sweep_interval),
            load_timeout: env_number("LOAD_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.load_timeout),
            server_port: env_number("SERVER_PORT").unwrap_or(defaults.server_port),
        })
    }

    // == Validate ==
    /// Rejects configurations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(CacheError::CapacityMisconfigured(
                "capacity must be greater than zero".to_string(),
            ));
        }
        if self.max_flush_batch == 0 {
            return Err(CacheError::InvalidRequest(
                "max_flush_batch must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: 1000,
            capacity_unit: CapacityUnit::Entries,
            eviction_policy: EvictionPolicy::Lru,
            write_policy: WritePolicy::Through,
            default_ttl: Some(Duration::from_secs(300)),
            flush_interval: Duration::from_secs(1),
            max_flush_batch: 100,
            sweep_interval: Duration::from_secs(1),
            load_timeout: Duration::from_secs(5),
            server_port: 3000,
        }
    }
}

fn env_number<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn env_parsed<T: FromStr<Err = CacheError>>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(v) => v.parse().map(Some),
        Err(_) => Ok(None),
    }
}
