//! Write-Back Flush Task
//!
//! Background task that writes batches of dirty entries to the backing store.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::CacheEngine;

/// Spawns a task that flushes one batch of dirty entries every `interval`.
///
/// Failed entries stay dirty and are retried on a later tick.
///
/// # Arguments
/// * `engine` - Cache whose dirty entries are flushed
/// * `interval` - Time between flush cycles
/// * `shutdown` - Receiver that flips to `true` when the task should exit
pub fn spawn_flush_task<V>(
    engine: CacheEngine<V>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        info!(?interval, "Starting write-back flush task");

        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = engine.flush_dirty().await;
                    if report.flushed > 0 {
                        debug!(flushed = report.flushed, "Flush cycle wrote dirty entries");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }

        debug!("Write-back flush task stopped");
    })
}
