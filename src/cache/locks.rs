//! Per-Key Write Locks
//!
//! Serializes writers of the same key across backend I/O without blocking
//! writers of other keys. Lock slots are created on demand and dropped once
//! the last holder or waiter releases them.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slot = Arc<AsyncMutex<()>>;

// == Key Locks ==
#[derive(Debug, Default)]
pub struct KeyLocks {
    slots: Mutex<HashMap<String, Slot>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    // == Lock ==
    /// Waits for exclusive write access to `key`.
    pub async fn lock(&self, key: &str) -> KeyGuard<'_> {
        let slot = self.slot(key);
        let guard = slot.clone().lock_owned().await;
        KeyGuard {
            locks: self,
            key: key.to_string(),
            slot: Some(slot),
            guard: Some(guard),
        }
    }

    // == Try Lock ==
    /// Takes write access to `key` only if nobody holds it.
    pub fn try_lock(&self, key: &str) -> Option<KeyGuard<'_>> {
        let slot = self.slot(key);
        match slot.clone().try_lock_owned() {
            Ok(guard) => Some(KeyGuard {
                locks: self,
                key: key.to_string(),
                slot: Some(slot),
                guard: Some(guard),
            }),
            Err(_) => {
                drop(slot);
                self.release(key);
                None
            }
        }
    }

    /// Number of keys with an active holder or waiter.
    #[cfg(test)]
    fn active(&self) -> usize {
        self.slots.lock().len()
    }

    fn slot(&self, key: &str) -> Slot {
        self.slots
            .lock()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Drops the slot if the table holds the only reference.
    fn release(&self, key: &str) {
        let mut slots = self.slots.lock();
        if slots
            .get(key)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            slots.remove(key);
        }
    }
}

// == Key Guard ==
/// Write access to one key; released on drop.
pub struct KeyGuard<'a> {
    locks: &'a KeyLocks,
    key: String,
    slot: Option<Slot>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        // The owned guard and our handle both count toward the slot's strong
        // count; release them before checking whether anyone else is queued.
        self.guard.take();
        self.slot.take();
        self.locks.release(&self.key);
    }
}
