//! Stampede Guard Module
//!
//! Coalesces concurrent misses for the same key into a single backend load.
//!
//! In-flight loads live in a side table as shared futures. The first caller
//! for a key spawns the load and every later caller subscribes to the same
//! future. The load runs as its own task, so a waiter that gives up never
//! cancels it; the load still populates the cache for future callers.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::warn;

use crate::error::{CacheError, Result};

/// A load that any number of callers can await.
pub type SharedLoad<V> = Shared<BoxFuture<'static, Result<V>>>;

// == Join ==
/// What a missing caller should do next.
pub enum Join<V> {
    /// The key became resident while the caller was arriving
    Ready(V),
    /// Await this load; `leader` is true for the caller that started it
    Wait { load: SharedLoad<V>, leader: bool },
}

// == Stampede Guard ==
pub struct StampedeGuard<V> {
    in_flight: Mutex<HashMap<String, SharedLoad<V>>>,
}

impl<V> Default for StampedeGuard<V> {
    fn default() -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
        }
    }
}

impl<V> StampedeGuard<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    // == Join ==
    /// Subscribes to the in-flight load for `key`, or starts one.
    ///
    /// `recheck` runs under the table lock before a new load is started, so a
    /// caller that arrives just after a load finished picks up the populated
    /// value instead of loading again. The future built by `start` must call
    /// [`StampedeGuard::complete`] once it has populated the cache, and also
    /// when it panics, or every later miss joins the failed load.
    pub fn join<R, S, F>(&self, key: &str, recheck: R, start: S) -> Join<V>
    where
        R: FnOnce() -> Option<V>,
        S: FnOnce() -> F,
        F: Future<Output = Result<V>> + Send + 'static,
    {
        let mut in_flight = self.in_flight.lock();

        if let Some(load) = in_flight.get(key) {
            return Join::Wait {
                load: load.clone(),
                leader: false,
            };
        }

        if let Some(value) = recheck() {
            return Join::Ready(value);
        }

        // complete() needs the table lock, so the task cannot remove its
        // entry before it has been inserted below.
        let handle = tokio::spawn(start());
        let load = async move {
            handle
                .await
                .unwrap_or_else(|e| Err(CacheError::Internal(format!("load task failed: {}", e))))
        }
        .boxed()
        .shared();

        in_flight.insert(key.to_string(), load.clone());
        Join::Wait { load, leader: true }
    }

    // == Complete ==
    /// Removes the table entry for a finished load.
    pub fn complete(&self, key: &str) {
        self.in_flight.lock().remove(key);
    }

    // == Wait ==
    /// Awaits a shared load for at most `timeout`.
    pub async fn wait(key: &str, load: SharedLoad<V>, timeout: Duration) -> Result<V> {
        match tokio::time::timeout(timeout, load).await {
            Ok(result) => result,
            Err(_) => {
                warn!(key, ?timeout, "Gave up waiting on in-flight load");
                Err(CacheError::LoadTimeout {
                    key: key.to_string(),
                    timeout,
                })
            }
        }
    }

    /// Snapshot of loads still running.
    pub fn pending(&self) -> Vec<SharedLoad<V>> {
        self.in_flight.lock().values().cloned().collect()
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn start_load(
        guard: &Arc<StampedeGuard<String>>,
        calls: &Arc<AtomicUsize>,
        key: &str,
        delay: Duration,
        result: Result<String>,
    ) -> Join<String> {
        let task_guard = guard.clone();
        let calls = calls.clone();
        let task_key = key.to_string();
        guard.join(
            key,
            || None,
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(delay).await;
                task_guard.complete(&task_key);
                result
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_joins_share_one_load() {
        let guard = Arc::new(StampedeGuard::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut loads = Vec::new();
        let mut leaders = 0;
        for _ in 0..5 {
            match start_load(&guard, &calls, "k", Duration::from_millis(50), Ok("v".into())) {
                Join::Wait { load, leader } => {
                    leaders += leader as usize;
                    loads.push(load);
                }
                Join::Ready(_) => panic!("nothing was resident"),
            }
        }

        for load in loads {
            assert_eq!(
                StampedeGuard::wait("k", load, Duration::from_secs(1)).await,
                Ok("v".to_string())
            );
        }
        assert_eq!(leaders, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(guard.in_flight_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_are_shared() {
        let guard = Arc::new(StampedeGuard::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let err = CacheError::BackendUnavailable("down".into());

        let first = start_load(&guard, &calls, "k", Duration::from_millis(10), Err(err.clone()));
        let second = start_load(&guard, &calls, "k", Duration::from_millis(10), Ok("unused".into()));

        for join in [first, second] {
            let Join::Wait { load, .. } = join else {
                panic!("expected a load");
            };
            assert_eq!(
                StampedeGuard::wait("k", load, Duration::from_secs(1)).await,
                Err(err.clone())
            );
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_does_not_cancel_load() {
        let guard = Arc::new(StampedeGuard::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let Join::Wait { load, .. } =
            start_load(&guard, &calls, "slow", Duration::from_secs(5), Ok("late".into()))
        else {
            panic!("expected a load");
        };

        let result = StampedeGuard::wait("slow", load.clone(), Duration::from_millis(100)).await;
        assert!(matches!(result, Err(CacheError::LoadTimeout { .. })));
        assert_eq!(guard.in_flight_count(), 1);

        // The load keeps running and finishes on its own
        assert_eq!(load.await, Ok("late".to_string()));
        assert_eq!(guard.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_recheck_short_circuits() {
        let guard = StampedeGuard::<String>::new();
        let join = guard.join(
            "k",
            || Some("cached".to_string()),
            || async { Err(CacheError::Internal("must not run".into())) },
        );

        assert!(matches!(join, Join::Ready(ref v) if v == "cached"));
        assert_eq!(guard.in_flight_count(), 0);
    }
}
