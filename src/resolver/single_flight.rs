//! Coalescing of concurrent requests for the same key
//!
//! The first caller for a key runs the work; every concurrent or later caller
//! for that key blocks on the same slot and receives a clone of the outcome,
//! success or error.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::error::Result;

pub struct SingleFlight<K, V> {
    slots: Mutex<HashMap<K, Arc<OnceLock<Result<V>>>>>,
}

impl<K, V> Default for SingleFlight<K, V> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone> SingleFlight<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outcome for `key`, running `work` only if no caller has started it yet
    pub fn get_or_run(&self, key: &K, work: impl FnOnce() -> Result<V>) -> Result<V> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(key.clone()).or_default())
        };
        slot.get_or_init(work).clone()
    }

    /// Number of distinct keys requested so far
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_concurrent_callers_share_one_run() {
        let flight: SingleFlight<String, usize> = SingleFlight::new();
        let runs = AtomicUsize::new(0);

        let results: Vec<usize> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        flight
                            .get_or_run(&"x".to_string(), || {
                                std::thread::sleep(Duration::from_millis(20));
                                Ok(runs.fetch_add(1, Ordering::SeqCst) + 100)
                            })
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|&r| r == 100));
    }

    #[test]
    fn test_errors_are_shared_too() {
        let flight: SingleFlight<u8, ()> = SingleFlight::new();
        let runs = AtomicUsize::new(0);
        for _ in 0..3 {
            let err = flight
                .get_or_run(&1, || {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Err(crate::error::runtime::operation("boom"))
                })
                .unwrap_err();
            assert_eq!(err, crate::error::runtime::operation("boom"));
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_distinct_keys_run_separately() {
        let flight: SingleFlight<u8, u8> = SingleFlight::new();
        assert_eq!(flight.get_or_run(&1, || Ok(10)).unwrap(), 10);
        assert_eq!(flight.get_or_run(&2, || Ok(20)).unwrap(), 20);
        assert_eq!(flight.get_or_run(&1, || Ok(99)).unwrap(), 10);
        assert_eq!(flight.len(), 2);
    }
}
