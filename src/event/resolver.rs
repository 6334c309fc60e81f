//! Observer Resolution
//!
//! Matches a [`ResolvableKey`] against every registered observer and
//! partitions the matches into delivery groups. Results are cached per key
//! for the lifetime of the resolver or until [`ObserverResolver::clear`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::debug;

use crate::cache::ComputingCache;
use crate::event::observer::ObserverMethod;
use crate::event::registry::ObserverProvider;
use crate::event::resolvable::ResolvableKey;

/// Matching observers for one key, partitioned by delivery group
#[derive(Clone, Default)]
pub struct ResolvedObservers {
    immediate_sync: Vec<Arc<dyn ObserverMethod>>,
    transactional: Vec<Arc<dyn ObserverMethod>>,
    async_observers: Vec<Arc<dyn ObserverMethod>>,
    metadata_required: bool,
}

impl ResolvedObservers {
    /// Partition `observers`, keeping their relative order within each group
    pub fn partition<I>(observers: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn ObserverMethod>>,
    {
        let mut resolved = Self::default();
        for observer in observers {
            resolved.metadata_required |= observer.requires_metadata();
            if observer.is_async() {
                resolved.async_observers.push(observer);
            } else if observer.transaction_phase().is_immediate() {
                resolved.immediate_sync.push(observer);
            } else {
                resolved.transactional.push(observer);
            }
        }
        resolved
    }

    pub fn immediate_sync_observers(&self) -> &[Arc<dyn ObserverMethod>] {
        &self.immediate_sync
    }

    pub fn transactional_observers(&self) -> &[Arc<dyn ObserverMethod>] {
        &self.transactional
    }

    pub fn async_observers(&self) -> &[Arc<dyn ObserverMethod>] {
        &self.async_observers
    }

    pub fn is_metadata_required(&self) -> bool {
        self.metadata_required
    }

    pub fn is_empty(&self) -> bool {
        self.immediate_sync.is_empty() && self.transactional.is_empty() && self.async_observers.is_empty()
    }

    /// Total number of observers across all groups
    pub fn len(&self) -> usize {
        self.immediate_sync.len() + self.transactional.len() + self.async_observers.len()
    }
}

impl fmt::Debug for ResolvedObservers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn ids(group: &[Arc<dyn ObserverMethod>]) -> Vec<&str> {
            group.iter().map(|o| o.id()).collect()
        }
        f.debug_struct("ResolvedObservers")
            .field("immediate_sync", &ids(&self.immediate_sync))
            .field("transactional", &ids(&self.transactional))
            .field("async", &ids(&self.async_observers))
            .field("metadata_required", &self.metadata_required)
            .finish()
    }
}

/// Type-safe observer resolver with a compute-once cache
pub struct ObserverResolver {
    observers: Arc<dyn ObserverProvider>,
    cache: ComputingCache<ResolvableKey, Arc<ResolvedObservers>>,
    scans: AtomicU64,
}

impl ObserverResolver {
    pub fn new(observers: Arc<dyn ObserverProvider>) -> Self {
        Self {
            observers,
            cache: ComputingCache::new(),
            scans: AtomicU64::new(0),
        }
    }

    /// Resolve observers for `key`.
    ///
    /// With `cache` set the result is computed at most once per distinct key.
    /// Without it the registry is scanned on every call and nothing is stored.
    pub fn resolve(&self, key: &ResolvableKey, cache: bool) -> Arc<ResolvedObservers> {
        if cache {
            self.cache.get_or_compute(key, |k| self.scan(k))
        } else {
            self.scan(key)
        }
    }

    fn scan(&self, key: &ResolvableKey) -> Arc<ResolvedObservers> {
        self.scans.fetch_add(1, Ordering::Relaxed);
        let resolved = ResolvedObservers::partition(
            self.observers
                .observers()
                .into_iter()
                .filter(|observer| observer.matches(key)),
        );
        debug!("Resolved {:?} to {:?}", key, resolved);
        Arc::new(resolved)
    }

    /// Invalidate every cached resolution
    pub fn clear(&self) {
        debug!("Clearing {} cached observer resolutions", self.cache.len());
        self.cache.clear();
    }

    pub fn cached_resolutions(&self) -> usize {
        self.cache.len()
    }

    /// Number of registry scans performed, cached or not
    pub fn scan_count(&self) -> u64 {
        self.scans.load(Ordering::Relaxed)
    }
}
