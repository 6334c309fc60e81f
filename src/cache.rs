//! Computing Cache
//!
//! Write-once-read-many cache used for observer resolution and event type
//! checks. Values are computed at most once per key under concurrent access:
//! a hit is a single map lookup, a miss serializes callers for that key only
//! on a per-key lock while other keys proceed independently.

use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

/// Concurrent compute-once cache keyed by structural equality
pub struct ComputingCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    values: DashMap<K, V>,
    locks: DashMap<K, Arc<Mutex<()>>>,
    generation: AtomicU64,
    computations: AtomicU64,
}

impl<K, V> ComputingCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            values: DashMap::new(),
            locks: DashMap::new(),
            generation: AtomicU64::new(0),
            computations: AtomicU64::new(0),
        }
    }

    /// Get the cached value, if present
    pub fn get(&self, key: &K) -> Option<V> {
        self.values.get(key).map(|entry| entry.value().clone())
    }

    /// Get the value for `key`, computing it on a miss.
    ///
    /// A failed computation stores nothing, so the next caller for the same
    /// key computes again. The key lock is only retired once a value is
    /// stored; until then later callers queue behind it.
    pub fn get_or_try_compute<E, F>(&self, key: &K, compute: F) -> Result<V, E>
    where
        F: FnOnce(&K) -> Result<V, E>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        let lock = Arc::clone(self.locks.entry(key.clone()).or_default().value());
        let _guard = lock.lock();

        // Another caller may have finished while we waited for the key lock
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        let generation = self.generation.load(Ordering::Acquire);
        self.computations.fetch_add(1, Ordering::Relaxed);
        let result = compute(key);

        if let Ok(value) = &result {
            // A clear() during computation invalidates this result for caching
            if self.generation.load(Ordering::Acquire) == generation {
                self.values.insert(key.clone(), value.clone());
                self.locks.remove_if(key, |_, current| Arc::ptr_eq(current, &lock));
            }
        }
        result
    }

    /// Get the value for `key`, computing it with an infallible function on a miss
    pub fn get_or_compute<F>(&self, key: &K, compute: F) -> V
    where
        F: FnOnce(&K) -> V,
    {
        match self.get_or_try_compute::<std::convert::Infallible, _>(key, |k| Ok(compute(k))) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Drop every cached value
    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.values.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of computations run since creation (hits excluded)
    pub fn computations(&self) -> u64 {
        self.computations.load(Ordering::Relaxed)
    }
}

impl<K, V> Default for ComputingCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
