//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint. Every handler is a
//! thin shell over one [`CacheEngine`] operation.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    Json,
};

use crate::backend::{BackingStore, InMemoryBackend};
use crate::cache::{CacheEngine, MAX_KEY_LENGTH};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    DeleteResponse, FlushResponse, GetResponse, HealthResponse, InvalidateResponse, SetRequest,
    SetResponse, StatsResponse,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Cache engine; cloning shares the same instance
    pub cache: CacheEngine<String>,
}

impl AppState {
    /// Creates a new AppState around an existing engine.
    pub fn new(cache: CacheEngine<String>) -> Self {
        Self { cache }
    }

    /// Creates a new AppState from configuration, backed by an in-memory store.
    ///
    /// # Errors
    /// Propagates configuration errors such as a zero capacity.
    pub fn from_config(config: &Config) -> Result<Self> {
        let backend: Arc<dyn BackingStore<String>> = Arc::new(InMemoryBackend::new());
        Self::with_backend(config, backend)
    }

    /// Creates a new AppState from configuration and a backing store.
    pub fn with_backend(config: &Config, backend: Arc<dyn BackingStore<String>>) -> Result<Self> {
        let cache = CacheEngine::for_strings(config.clone(), backend)?;
        Ok(Self::new(cache))
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidRequest("Key cannot be empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(CacheError::InvalidRequest(format!(
            "Key exceeds maximum length of {} characters",
            MAX_KEY_LENGTH
        )));
    }
    Ok(())
}

/// Handler for PUT /set
///
/// Stores a key-value pair through the configured write policy.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    // Validate request
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let ttl = req.ttl.map(Duration::from_secs);
    state.cache.put(&req.key, req.value, ttl).await?;

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for GET /get/:key
///
/// Reads a key, loading it from the backing store on a miss.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    validate_key(&key)?;
    let outcome = state.cache.get(&key).await?;

    Ok(Json(GetResponse::new(key, outcome.value, outcome.hit)))
}

/// Handler for DELETE /del/:key
///
/// Deletes a key from the backing store and the cache. Absent keys succeed.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    validate_key(&key)?;
    state.cache.delete(&key).await?;

    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for POST /invalidate/:key
///
/// Drops the cached copy of a key so the next read reloads it.
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<InvalidateResponse>> {
    validate_key(&key)?;
    let was_cached = state.cache.invalidate(&key).await?;

    Ok(Json(InvalidateResponse::new(key, was_cached)))
}

/// Handler for POST /flush
///
/// Runs one write-back flush batch immediately.
pub async fn flush_handler(State(state): State<AppState>) -> Json<FlushResponse> {
    let report = state.cache.flush_dirty().await;
    Json(FlushResponse::from(report))
}

/// Handler for GET /stats
///
/// Returns current cache statistics.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let cache = &state.cache;
    Json(StatsResponse::new(
        cache.stats(),
        cache.eviction_policy(),
        cache.write_policy(),
    ))
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
