use std::collections::HashSet;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Keyed in-process exclusion. At most one holder per fingerprint at a time;
/// distinct fingerprints never wait on each other.
#[derive(Debug, Default)]
pub struct FingerprintLocks {
    inflight: Mutex<HashSet<String>>,
    released: Condvar,
}

impl FingerprintLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until no other holder owns `key`.
    pub fn acquire(&self, key: &str) -> FingerprintGuard<'_> {
        let mut inflight = self.lock_inflight();
        while inflight.contains(key) {
            inflight = self
                .released
                .wait(inflight)
                .unwrap_or_else(PoisonError::into_inner);
        }
        inflight.insert(key.to_string());

        FingerprintGuard {
            locks: self,
            key: key.to_string(),
        }
    }

    // A panicking holder still releases its key on drop, so the set stays
    // consistent even when the mutex reports poison.
    fn lock_inflight(&self) -> MutexGuard<'_, HashSet<String>> {
        self.inflight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[must_use = "the fingerprint is released as soon as the guard drops"]
pub struct FingerprintGuard<'a> {
    locks: &'a FingerprintLocks,
    key: String,
}

impl Drop for FingerprintGuard<'_> {
    fn drop(&mut self) {
        self.locks.lock_inflight().remove(&self.key);
        self.locks.released.notify_all();
    }
}
