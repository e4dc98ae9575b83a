//! TTL Sweep Task
//!
//! Background task that periodically removes expired cache entries, so
//! entries nobody reads again still release their capacity.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::CacheEngine;

/// Spawns a task that sweeps expired entries every `interval`.
///
/// Expired entries that are still dirty are skipped; the flush task has to
/// write them out first.
///
/// # Arguments
/// * `engine` - Cache whose entries are swept
/// * `interval` - Time between sweeps
/// * `shutdown` - Receiver that flips to `true` when the task should exit
///
/// # Returns
/// A JoinHandle that completes once shutdown has been observed.
pub fn spawn_sweep_task<V>(
    engine: CacheEngine<V>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        info!(?interval, "Starting TTL sweep task");

        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = engine.sweep_expired();
                    if removed > 0 {
                        info!(removed, "TTL sweep removed expired entries");
                    } else {
                        debug!("TTL sweep: no expired entries found");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }

        debug!("TTL sweep task stopped");
    })
}
