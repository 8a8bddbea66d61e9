use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Named mutual exclusion with a validity window, used to serialize runs for
/// the same message.
pub trait RunLock: Send + Sync {
    /// Take the lock for `key` when it is free or its holder's validity has
    /// expired. The guard releases on drop.
    fn try_acquire(&self, key: &str, ttl: Duration) -> Option<LockGuard>;
}

/// Releases its lock when dropped.
pub struct LockGuard {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl LockGuard {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// In-process [`RunLock`] keyed by name.
///
/// A holder that outlives its validity window can have the key stolen by the
/// next acquirer; a later release by the original holder may then clear the
/// successor's claim. The window bounds that exposure.
pub struct MemoryLocks {
    held: Arc<Mutex<HashMap<String, Instant>>>,
}

impl MemoryLocks {
    pub fn new() -> Self {
        Self {
            held: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Default for MemoryLocks {
    fn default() -> Self {
        Self::new()
    }
}

impl RunLock for MemoryLocks {
    fn try_acquire(&self, key: &str, ttl: Duration) -> Option<LockGuard> {
        let mut held = self
            .held
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Instant::now();
        if let Some(expiry) = held.get(key) {
            if *expiry > now {
                return None;
            }
        }
        held.insert(key.to_string(), now + ttl);
        let table = Arc::clone(&self.held);
        let key = key.to_string();
        Some(LockGuard::new(move || {
            table
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .remove(&key);
        }))
    }
}
