use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// Map size at which idle entries are swept.
const SWEEP_THRESHOLD: usize = 64;

/// Per-session reader/writer locks.
///
/// Answer intake takes the shared side; operations that snapshot or reshape
/// the participant set (join, round resolution, revival, skip) take the
/// exclusive side, so a racing answer either lands before the snapshot or
/// sees the question closed.
#[derive(Default)]
pub struct SessionLocks {
    locks: Mutex<LockMap>,
}

#[derive(Default)]
struct LockMap {
    entries: HashMap<String, Arc<RwLock<()>>>,
    sweep_at: usize,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, session_id: &str) -> Arc<RwLock<()>> {
        // a poisoned map only means another thread panicked mid-insert; the map itself is intact
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if locks.entries.len() >= locks.sweep_at.max(SWEEP_THRESHOLD) {
            // the map holds the only reference to an idle lock: no guard, no waiter
            locks.entries.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.sweep_at = locks.entries.len() * 2;
        }
        locks
            .entries
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    pub async fn exclusive(&self, session_id: &str) -> OwnedRwLockWriteGuard<()> {
        self.lock_for(session_id).write_owned().await
    }

    pub async fn shared(&self, session_id: &str) -> OwnedRwLockReadGuard<()> {
        self.lock_for(session_id).read_owned().await
    }

    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
