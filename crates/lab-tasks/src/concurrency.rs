use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

/// Tracks in-flight run counts per task id, capped per call to
/// [`ConcurrencyGuard::try_acquire`]. Used both for the "one run at a time
/// per task_id" rule and, with `max` set to the pool-wide bound, for the
/// global `max_concurrent` cap.
pub struct ConcurrencyGuard {
    counts: RwLock<HashMap<String, Arc<AtomicU32>>>,
}

impl Default for ConcurrencyGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl ConcurrencyGuard {
    pub fn new() -> Self {
        Self { counts: RwLock::new(HashMap::new()) }
    }

    fn counter_for(&self, key: &str) -> Arc<AtomicU32> {
        if let Some(c) = self.counts.read().get(key) {
            return c.clone();
        }
        self.counts.write().entry(key.to_owned()).or_insert_with(|| Arc::new(AtomicU32::new(0))).clone()
    }

    /// Attempts to reserve one slot for `key`, refusing once `max` are held.
    pub fn try_acquire(&self, key: &str, max: u32) -> bool {
        let counter = self.counter_for(key);
        loop {
            let current = counter.load(Ordering::Acquire);
            if current >= max {
                return false;
            }
            if counter.compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire).is_ok() {
                return true;
            }
        }
    }

    pub fn release(&self, key: &str) {
        if let Some(c) = self.counts.read().get(key) {
            c.fetch_sub(1, Ordering::AcqRel);
        }
    }

    pub fn in_flight(&self, key: &str) -> u32 {
        self.counts.read().get(key).map(|c| c.load(Ordering::Acquire)).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_respects_max() {
        let guard = ConcurrencyGuard::new();
        assert!(guard.try_acquire("t1", 1));
        assert!(!guard.try_acquire("t1", 1));
        assert_eq!(guard.in_flight("t1"), 1);
    }

    #[test]
    fn release_frees_a_slot() {
        let guard = ConcurrencyGuard::new();
        assert!(guard.try_acquire("t1", 1));
        guard.release("t1");
        assert_eq!(guard.in_flight("t1"), 0);
        assert!(guard.try_acquire("t1", 1));
    }

    #[test]
    fn independent_keys_dont_interfere() {
        let guard = ConcurrencyGuard::new();
        assert!(guard.try_acquire("t1", 1));
        assert!(guard.try_acquire("t2", 1));
        assert_eq!(guard.in_flight("t1"), 1);
        assert_eq!(guard.in_flight("t2"), 1);
    }

    #[test]
    fn unacquired_key_has_zero_in_flight() {
        let guard = ConcurrencyGuard::new();
        assert_eq!(guard.in_flight("ghost"), 0);
    }
}
