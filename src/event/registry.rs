//! Observer Registry
//!
//! Holds the registered observers in a deterministic total order: ascending
//! priority, then registration sequence. Observers of equal priority are
//! therefore kept in registration order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::debug;
use parking_lot::RwLock;
use thiserror::Error;

use crate::event::observer::ObserverMethod;

/// Source of registered observers, normally the bean model
pub trait ObserverProvider: Send + Sync {
    /// Every registered observer, in notification order
    fn observers(&self) -> Vec<Arc<dyn ObserverMethod>>;
}

/// Registration errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Observer with ID '{0}' already registered")]
    AlreadyRegistered(String),

    #[error("Observer with ID '{0}' not found")]
    NotFound(String),
}

struct Registration {
    sequence: u64,
    observer: Arc<dyn ObserverMethod>,
}

/// Default [`ObserverProvider`] backed by an in-memory list
pub struct ObserverRegistry {
    registrations: RwLock<Vec<Registration>>,
    next_sequence: AtomicU64,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self {
            registrations: RwLock::new(Vec::new()),
            next_sequence: AtomicU64::new(0),
        }
    }

    /// Register an observer.
    ///
    /// Resolution caches built before this call do not see the new observer
    /// until they are cleared.
    pub fn register(&self, observer: Arc<dyn ObserverMethod>) -> Result<(), RegistryError> {
        let mut registrations = self.registrations.write();
        if registrations.iter().any(|r| r.observer.id() == observer.id()) {
            return Err(RegistryError::AlreadyRegistered(observer.id().to_string()));
        }

        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        let priority = observer.priority();
        // Insert after every registration that sorts before or equal to this one
        let position = registrations
            .iter()
            .position(|r| r.observer.priority() > priority)
            .unwrap_or(registrations.len());
        debug!(
            "Registered observer '{}' (priority {}, sequence {})",
            observer.id(),
            priority,
            sequence
        );
        registrations.insert(position, Registration { sequence, observer });
        Ok(())
    }

    pub fn unregister(&self, observer_id: &str) -> Result<(), RegistryError> {
        let mut registrations = self.registrations.write();
        let before = registrations.len();
        registrations.retain(|r| r.observer.id() != observer_id);
        if registrations.len() == before {
            return Err(RegistryError::NotFound(observer_id.to_string()));
        }
        debug!("Unregistered observer '{}'", observer_id);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.registrations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.read().is_empty()
    }

    pub fn contains(&self, observer_id: &str) -> bool {
        self.registrations
            .read()
            .iter()
            .any(|r| r.observer.id() == observer_id)
    }

    /// Registration sequence numbers in notification order
    pub fn sequences(&self) -> Vec<u64> {
        self.registrations.read().iter().map(|r| r.sequence).collect()
    }
}

impl Default for ObserverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ObserverProvider for ObserverRegistry {
    fn observers(&self) -> Vec<Arc<dyn ObserverMethod>> {
        self.registrations
            .read()
            .iter()
            .map(|r| Arc::clone(&r.observer))
            .collect()
    }
}
