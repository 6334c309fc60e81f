//! Event Type Validation
//!
//! Strict notifiers reject event types that user code must never fire: types
//! with unresolved type variables or wildcards, and types assignable to a
//! container lifecycle event. The check is pure given the type, so results
//! (including the "no error" outcome) are memoized per type.

use std::sync::Arc;

use log::debug;

use crate::cache::ComputingCache;
use crate::event::error::InvalidEventType;
use crate::event::types::{EventType, TypeClosureProvider};

/// Raw names of the container lifecycle event supertypes
pub const CONTAINER_LIFECYCLE_EVENT_TYPES: &[&str] = &[
    "BeforeBeanDiscovery",
    "AfterTypeDiscovery",
    "AfterBeanDiscovery",
    "AfterDeploymentValidation",
    "BeforeShutdown",
    "ProcessAnnotatedType",
    "ProcessInjectionPoint",
    "ProcessInjectionTarget",
    "ProcessBeanAttributes",
    "ProcessBean",
    "ProcessObserverMethod",
    "ProcessProducer",
];

/// Strict or lenient event type checker
pub struct EventTypeValidator {
    types: Arc<dyn TypeClosureProvider>,
    reserved: Vec<EventType>,
    // Lenient validators never check, so they carry no cache
    cache: Option<ComputingCache<EventType, Result<(), InvalidEventType>>>,
}

impl EventTypeValidator {
    /// Validator enforcing the checks, reserving the built-in lifecycle types
    pub fn strict(types: Arc<dyn TypeClosureProvider>) -> Self {
        Self {
            types,
            reserved: CONTAINER_LIFECYCLE_EVENT_TYPES
                .iter()
                .map(|name| EventType::named(*name))
                .collect(),
            cache: Some(ComputingCache::new()),
        }
    }

    /// Validator that accepts every type, for internal dispatch
    pub fn lenient(types: Arc<dyn TypeClosureProvider>) -> Self {
        Self {
            types,
            reserved: Vec::new(),
            cache: None,
        }
    }

    /// Reserve additional lifecycle event type names
    pub fn reserve<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.reserved
            .extend(names.into_iter().map(|name| EventType::named(name.as_ref())));
        self
    }

    pub fn is_strict(&self) -> bool {
        self.cache.is_some()
    }

    /// Check `event_type`; always `Ok` when lenient
    pub fn check(&self, event_type: &EventType) -> Result<(), InvalidEventType> {
        match &self.cache {
            Some(cache) => cache.get_or_compute(event_type, |t| self.compute(t)),
            None => Ok(()),
        }
    }

    fn compute(&self, event_type: &EventType) -> Result<(), InvalidEventType> {
        debug!("Checking event type {}", event_type);
        if event_type.contains_unresolved() {
            return Err(InvalidEventType::TypeParameterNotAllowed {
                event_type: event_type.clone(),
            });
        }

        let closure = self.types.type_closure(&event_type.raw());
        for reserved in &self.reserved {
            if closure.iter().any(|t| reserved.accepts(t)) {
                return Err(InvalidEventType::ReservedLifecycleType {
                    event_type: event_type.clone(),
                    reserved: reserved.clone(),
                });
            }
        }
        Ok(())
    }

    /// Number of memoized check results
    pub fn cached_checks(&self) -> usize {
        self.cache.as_ref().map_or(0, ComputingCache::len)
    }

    /// Drop memoized results
    pub fn clear(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }
}
