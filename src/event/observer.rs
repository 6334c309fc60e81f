//! Events and Observer Methods
//!
//! Observers are owned outside the engine; the engine only holds `Arc`
//! references and talks to them through [`ObserverMethod`].

use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::event::error::BoxError;
use crate::event::metadata::EventMetadata;
use crate::event::qualifier::Qualifier;
use crate::event::resolvable::ResolvableKey;
use crate::event::types::EventType;

/// Priority given to observers that do not declare one
pub const DEFAULT_OBSERVER_PRIORITY: i32 = 2500;

/// Access to the concrete value behind a trait object
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A value that can be fired as an event
pub trait Event: AsAny + Send + Sync + fmt::Debug {
    /// Runtime type the event resolves by
    fn event_type(&self) -> EventType;
}

impl dyn Event {
    /// Downcast to the concrete event type
    pub fn downcast_ref<T: Event>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn is<T: Event>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

/// When an observer wants delivery relative to a surrounding transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransactionPhase {
    /// No transactional preference
    #[default]
    None,
    /// Immediate delivery during the transaction
    InProgress,
    BeforeCompletion,
    AfterCompletion,
    AfterSuccess,
    AfterFailure,
}

impl TransactionPhase {
    /// Phases that are delivered in the immediate synchronous group
    pub fn is_immediate(self) -> bool {
        matches!(self, TransactionPhase::None | TransactionPhase::InProgress)
    }
}

/// Capability interface of an observer method
pub trait ObserverMethod: Send + Sync {
    /// Identifier used in logs and failure reports
    fn id(&self) -> &str;

    /// Whether this observer receives events resolved against `key`
    fn matches(&self, key: &ResolvableKey) -> bool;

    /// Deliver an event.
    ///
    /// `metadata` is `None` unless at least one observer of the resolved set
    /// requires metadata.
    fn notify(&self, event: &dyn Event, metadata: Option<&EventMetadata>) -> Result<(), BoxError>;

    fn is_async(&self) -> bool {
        false
    }

    fn transaction_phase(&self) -> TransactionPhase {
        TransactionPhase::None
    }

    fn requires_metadata(&self) -> bool {
        false
    }

    /// Lower values are notified first
    fn priority(&self) -> i32 {
        DEFAULT_OBSERVER_PRIORITY
    }
}

type Handler = Box<dyn Fn(&dyn Event, Option<&EventMetadata>) -> Result<(), BoxError> + Send + Sync>;

/// Closure-backed observer for a declared event type and qualifier set
pub struct ObserverFn {
    id: String,
    observed_type: EventType,
    qualifiers: BTreeSet<Qualifier>,
    is_async: bool,
    phase: TransactionPhase,
    requires_metadata: bool,
    priority: i32,
    handler: Handler,
}

impl ObserverFn {
    pub fn builder(id: impl Into<String>, observed_type: EventType) -> ObserverFnBuilder {
        ObserverFnBuilder {
            id: id.into(),
            observed_type,
            qualifiers: BTreeSet::new(),
            is_async: false,
            phase: TransactionPhase::None,
            requires_metadata: false,
            priority: DEFAULT_OBSERVER_PRIORITY,
        }
    }

    pub fn observed_type(&self) -> &EventType {
        &self.observed_type
    }

    pub fn observed_qualifiers(&self) -> &BTreeSet<Qualifier> {
        &self.qualifiers
    }
}

impl fmt::Debug for ObserverFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverFn")
            .field("id", &self.id)
            .field("observed_type", &self.observed_type.to_string())
            .field("is_async", &self.is_async)
            .field("phase", &self.phase)
            .field("priority", &self.priority)
            .finish()
    }
}

impl ObserverMethod for ObserverFn {
    fn id(&self) -> &str {
        &self.id
    }

    fn matches(&self, key: &ResolvableKey) -> bool {
        key.has_type_accepted_by(&self.observed_type) && key.has_all_qualifiers(&self.qualifiers)
    }

    fn notify(&self, event: &dyn Event, metadata: Option<&EventMetadata>) -> Result<(), BoxError> {
        (self.handler)(event, metadata)
    }

    fn is_async(&self) -> bool {
        self.is_async
    }

    fn transaction_phase(&self) -> TransactionPhase {
        self.phase
    }

    fn requires_metadata(&self) -> bool {
        self.requires_metadata
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

/// Builder for [`ObserverFn`]
pub struct ObserverFnBuilder {
    id: String,
    observed_type: EventType,
    qualifiers: BTreeSet<Qualifier>,
    is_async: bool,
    phase: TransactionPhase,
    requires_metadata: bool,
    priority: i32,
}

impl ObserverFnBuilder {
    pub fn qualifier(mut self, qualifier: Qualifier) -> Self {
        self.qualifiers.insert(qualifier);
        self
    }

    pub fn asynchronous(mut self) -> Self {
        self.is_async = true;
        self
    }

    pub fn during(mut self, phase: TransactionPhase) -> Self {
        self.phase = phase;
        self
    }

    pub fn with_metadata(mut self) -> Self {
        self.requires_metadata = true;
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Finish with a handler over any event payload
    pub fn handler<F>(self, handler: F) -> ObserverFn
    where
        F: Fn(&dyn Event, Option<&EventMetadata>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        ObserverFn {
            id: self.id,
            observed_type: self.observed_type,
            qualifiers: self.qualifiers,
            is_async: self.is_async,
            phase: self.phase,
            requires_metadata: self.requires_metadata,
            priority: self.priority,
            handler: Box::new(handler),
        }
    }

    /// Finish with a handler over a concrete payload type.
    ///
    /// Payloads of any other concrete type are ignored.
    pub fn typed<T, F>(self, handler: F) -> ObserverFn
    where
        T: Event,
        F: Fn(&T, Option<&EventMetadata>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.handler(move |event, metadata| match event.downcast_ref::<T>() {
            Some(payload) => handler(payload, metadata),
            None => Ok(()),
        })
    }

    /// Finish and wrap in an `Arc` ready for registration
    pub fn build<F>(self, handler: F) -> Arc<dyn ObserverMethod>
    where
        F: Fn(&dyn Event, Option<&EventMetadata>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Arc::new(self.handler(handler))
    }
}
