//! Background Tasks Module
//!
//! Periodic maintenance that runs alongside the cache engine.
//!
//! # Tasks
//! - TTL Sweep: removes expired entries at a fixed interval
//! - Write-Back Flush: writes dirty entries to the backing store in batches
//!
//! Every task listens on a shared shutdown channel and exits at the next
//! tick boundary once it fires.

mod flush;
mod sweep;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub use flush::spawn_flush_task;
pub use sweep::spawn_sweep_task;

// == Background Tasks ==
/// Handles of the running maintenance tasks plus their shutdown signal.
pub struct BackgroundTasks {
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shutdown_tx,
            handles: Vec::new(),
        }
    }
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// A receiver that flips to `true` when [`BackgroundTasks::stop`] is called.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    pub fn push(&mut self, handle: JoinHandle<()>) {
        self.handles.push(handle);
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    // == Stop ==
    /// Signals shutdown and waits for every task to exit.
    pub async fn stop(self) {
        // No receivers left just means every task already exited
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }
        debug!("Background tasks stopped");
    }
}
