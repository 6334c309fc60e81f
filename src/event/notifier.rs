//! Observer Notifier
//!
//! Resolves observers for fired events and delivers events to them.
//!
//! Delivery order for one firing is fixed: immediate synchronous observers,
//! then transactional observers (delivered synchronously, there is no
//! transaction integration), then, for async firings only, the async
//! observers on a single worker task. Synchronous delivery stops at the first
//! failure. Async delivery notifies every observer and reports all failures
//! together through the returned [`AsyncDelivery`].
//!
//! A notifier is either strict, checking event types before resolution, or
//! lenient. The lenient form is meant for internal dispatch only.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, warn};

use crate::event::config::NotifierConfig;
use crate::event::delivery::AsyncDelivery;
use crate::event::error::{
    AsyncDeliveryError, BoxError, NotifierResult, ObserverFailure, ObserverPanic,
};
use crate::event::executor::{ExecutorServices, FixedExecutorServices, RayonExecutor, TaskExecutor};
use crate::event::metadata::{self, EventMetadata};
use crate::event::observer::{Event, ObserverMethod};
use crate::event::qualifier::Qualifier;
use crate::event::registry::ObserverProvider;
use crate::event::resolvable::{ResolvableBuilder, ResolvableKey};
use crate::event::resolver::{ObserverResolver, ResolvedObservers};
use crate::event::security::{
    NoopSecurityServices, SecurityAssociation, SecurityContext, SecurityServices,
};
use crate::event::types::{EventType, TypeClosureProvider};
use crate::event::validation::EventTypeValidator;

/// Snapshot of notifier activity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotifierStats {
    /// Synchronous and asynchronous firings that passed validation
    pub events_fired: u64,

    /// Async delivery tasks handed to an executor
    pub async_deliveries: u64,

    /// Individual observer notifications attempted
    pub observer_notifications: u64,

    /// Individual observer notifications that failed
    pub observer_failures: u64,
}

#[derive(Default)]
struct Counters {
    events_fired: AtomicU64,
    async_deliveries: AtomicU64,
    observer_notifications: AtomicU64,
    observer_failures: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> NotifierStats {
        NotifierStats {
            events_fired: self.events_fired.load(Ordering::Relaxed),
            async_deliveries: self.async_deliveries.load(Ordering::Relaxed),
            observer_notifications: self.observer_notifications.load(Ordering::Relaxed),
            observer_failures: self.observer_failures.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.events_fired.store(0, Ordering::Relaxed);
        self.async_deliveries.store(0, Ordering::Relaxed);
        self.observer_notifications.store(0, Ordering::Relaxed);
        self.observer_failures.store(0, Ordering::Relaxed);
    }
}

/// Event resolution and delivery
pub struct ObserverNotifier {
    types: Arc<dyn TypeClosureProvider>,
    resolver: ObserverResolver,
    validator: EventTypeValidator,
    executor: Arc<dyn TaskExecutor>,
    security: Arc<dyn SecurityServices>,
    counters: Arc<Counters>,
}

impl ObserverNotifier {
    pub fn builder(
        types: Arc<dyn TypeClosureProvider>,
        observers: Arc<dyn ObserverProvider>,
    ) -> NotifierBuilder {
        NotifierBuilder {
            types,
            observers,
            strict: true,
            reserved: Vec::new(),
            executor_services: None,
            security: None,
        }
    }

    /// Strict notifier with the default executor and no security propagation
    pub fn strict(types: Arc<dyn TypeClosureProvider>, observers: Arc<dyn ObserverProvider>) -> Self {
        Self::builder(types, observers).build()
    }

    /// Lenient notifier for internal dispatch
    pub fn lenient(types: Arc<dyn TypeClosureProvider>, observers: Arc<dyn ObserverProvider>) -> Self {
        Self::builder(types, observers).strict(false).build()
    }

    pub fn is_strict(&self) -> bool {
        self.validator.is_strict()
    }

    /// Build the resolvable key for an event type and its qualifiers
    pub fn build_resolvable(&self, event_type: &EventType, qualifiers: &[Qualifier]) -> ResolvableKey {
        ResolvableBuilder::for_event_type(self.types.as_ref(), event_type)
            .add_qualifiers(qualifiers)
            .create()
    }

    /// Verify `event_type` when strict; a no-op when lenient
    pub fn check_event_object_type(&self, event_type: &EventType) -> NotifierResult<()> {
        self.validator.check(event_type)?;
        Ok(())
    }

    /// Resolve observers for an event type and qualifiers, using the cache
    pub fn resolve_observer_methods(
        &self,
        event_type: &EventType,
        qualifiers: &[Qualifier],
    ) -> NotifierResult<Arc<ResolvedObservers>> {
        self.check_event_object_type(event_type)?;
        let key = self.build_resolvable(event_type, qualifiers);
        Ok(self.resolver.resolve(&key, true))
    }

    /// Resolve observers for a caller-built key, bypassing the cache
    pub fn resolve_with_resolvable(&self, key: &ResolvableKey) -> Arc<ResolvedObservers> {
        self.resolver.resolve(key, false)
    }

    /// Fire `event` resolved by its runtime type
    pub fn fire_event(
        &self,
        event: &dyn Event,
        metadata: Option<EventMetadata>,
        qualifiers: &[Qualifier],
    ) -> NotifierResult<()> {
        self.fire_event_as(&event.event_type(), event, metadata, qualifiers)
    }

    /// Fire `event` resolved by an explicit event type
    pub fn fire_event_as(
        &self,
        event_type: &EventType,
        event: &dyn Event,
        metadata: Option<EventMetadata>,
        qualifiers: &[Qualifier],
    ) -> NotifierResult<()> {
        let observers = self.resolve_observer_methods(event_type, qualifiers)?;
        self.counters.events_fired.fetch_add(1, Ordering::Relaxed);
        self.notify(&observers, event, metadata)
    }

    /// Fire `event` against a caller-built key.
    ///
    /// The event's runtime type is still checked. Resolution is not cached,
    /// which suits irregular qualifier combinations.
    pub fn fire_event_with_resolvable(&self, event: &dyn Event, key: &ResolvableKey) -> NotifierResult<()> {
        self.check_event_object_type(&event.event_type())?;
        let observers = self.resolve_with_resolvable(key);
        self.counters.events_fired.fetch_add(1, Ordering::Relaxed);
        self.notify(&observers, event, None)
    }

    /// Fire `event` asynchronously, resolved by its runtime type.
    ///
    /// Synchronous and transactional observers run on the calling thread
    /// before this returns; their failures are returned directly and no
    /// async delivery is scheduled.
    pub fn fire_async(
        &self,
        event: Arc<dyn Event>,
        metadata: Option<EventMetadata>,
        qualifiers: &[Qualifier],
        executor: Option<Arc<dyn TaskExecutor>>,
    ) -> NotifierResult<AsyncDelivery> {
        let event_type = event.event_type();
        self.fire_async_as(&event_type, event, metadata, qualifiers, executor)
    }

    /// Fire `event` asynchronously, resolved by an explicit event type
    pub fn fire_async_as(
        &self,
        event_type: &EventType,
        event: Arc<dyn Event>,
        metadata: Option<EventMetadata>,
        qualifiers: &[Qualifier],
        executor: Option<Arc<dyn TaskExecutor>>,
    ) -> NotifierResult<AsyncDelivery> {
        let observers = self.resolve_observer_methods(event_type, qualifiers)?;
        self.counters.events_fired.fetch_add(1, Ordering::Relaxed);
        self.notify_async(&observers, event, metadata, executor)
    }

    /// Deliver `event` to the synchronous and transactional groups
    pub fn notify(
        &self,
        observers: &ResolvedObservers,
        event: &dyn Event,
        metadata: Option<EventMetadata>,
    ) -> NotifierResult<()> {
        let metadata = Self::effective_metadata(observers, metadata);
        self.notify_immediate(observers, event, metadata.as_ref())
    }

    /// Deliver `event` to the synchronous groups, then schedule the async group.
    ///
    /// `executor` overrides the notifier's executor for this delivery.
    pub fn notify_async(
        &self,
        observers: &ResolvedObservers,
        event: Arc<dyn Event>,
        metadata: Option<EventMetadata>,
        executor: Option<Arc<dyn TaskExecutor>>,
    ) -> NotifierResult<AsyncDelivery> {
        let metadata = Self::effective_metadata(observers, metadata);
        self.notify_immediate(observers, event.as_ref(), metadata.as_ref())?;
        Ok(self.notify_async_observers(observers.async_observers(), event, metadata, executor))
    }

    fn effective_metadata(
        observers: &ResolvedObservers,
        metadata: Option<EventMetadata>,
    ) -> Option<Arc<EventMetadata>> {
        if observers.is_metadata_required() {
            metadata.map(Arc::new)
        } else {
            None
        }
    }

    /// Sync then transactional groups, inside one current-metadata scope
    fn notify_immediate(
        &self,
        observers: &ResolvedObservers,
        event: &dyn Event,
        metadata: Option<&Arc<EventMetadata>>,
    ) -> NotifierResult<()> {
        let _scope = metadata::push_if_some(metadata.cloned());
        self.notify_sync_observers(observers.immediate_sync_observers(), event, metadata)?;
        self.notify_transaction_observers(observers.transactional_observers(), event, metadata)
    }

    fn notify_sync_observers(
        &self,
        observers: &[Arc<dyn ObserverMethod>],
        event: &dyn Event,
        metadata: Option<&Arc<EventMetadata>>,
    ) -> NotifierResult<()> {
        for observer in observers {
            self.counters.observer_notifications.fetch_add(1, Ordering::Relaxed);
            if let Err(source) = observer.notify(event, metadata.map(|m| &**m)) {
                self.counters.observer_failures.fetch_add(1, Ordering::Relaxed);
                debug!("Observer '{}' failed, aborting synchronous delivery", observer.id());
                return Err(ObserverFailure::new(observer.id(), source).into());
            }
        }
        Ok(())
    }

    fn notify_transaction_observers(
        &self,
        observers: &[Arc<dyn ObserverMethod>],
        event: &dyn Event,
        metadata: Option<&Arc<EventMetadata>>,
    ) -> NotifierResult<()> {
        // No transaction support: transactional observers are notified immediately
        self.notify_sync_observers(observers, event, metadata)
    }

    fn notify_async_observers(
        &self,
        observers: &[Arc<dyn ObserverMethod>],
        event: Arc<dyn Event>,
        metadata: Option<Arc<EventMetadata>>,
        executor: Option<Arc<dyn TaskExecutor>>,
    ) -> AsyncDelivery {
        if observers.is_empty() {
            return AsyncDelivery::completed(event);
        }

        let executor = executor.unwrap_or_else(|| Arc::clone(&self.executor));
        let security_context = self.security.security_context();
        let observers = observers.to_vec();
        let counters = Arc::clone(&self.counters);
        let (completer, delivery) = AsyncDelivery::pending();

        debug!(
            "Scheduling async delivery of {} to {} observer(s)",
            event.event_type(),
            observers.len()
        );
        self.counters.async_deliveries.fetch_add(1, Ordering::Relaxed);
        executor.execute(Box::new(move || {
            let outcome = deliver_serially(&observers, event.as_ref(), metadata, security_context, &counters);
            completer.complete(outcome.map(|()| event));
        }));
        delivery
    }

    /// Clear cached observer resolutions and event type checks
    pub fn clear(&self) {
        self.resolver.clear();
        self.validator.clear();
    }

    pub fn cached_resolutions(&self) -> usize {
        self.resolver.cached_resolutions()
    }

    pub fn cached_type_checks(&self) -> usize {
        self.validator.cached_checks()
    }

    pub fn resolver(&self) -> &ObserverResolver {
        &self.resolver
    }

    pub fn stats(&self) -> NotifierStats {
        self.counters.snapshot()
    }

    pub fn reset_stats(&self) {
        self.counters.reset();
    }
}

/// Notify every async observer in order on the current worker thread.
///
/// Runs with the metadata and security context established for this thread
/// only; both are released before the outcome is returned.
fn deliver_serially(
    observers: &[Arc<dyn ObserverMethod>],
    event: &dyn Event,
    metadata: Option<Arc<EventMetadata>>,
    security_context: Box<dyn SecurityContext>,
    counters: &Counters,
) -> Result<(), AsyncDeliveryError> {
    let mut failures = Vec::new();
    {
        // Released in reverse: metadata popped before security is dissociated
        let _security = SecurityAssociation::enter(security_context);
        let _scope = metadata::push_if_some(metadata.clone());

        for observer in observers {
            counters.observer_notifications.fetch_add(1, Ordering::Relaxed);
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                observer.notify(event, metadata.as_deref())
            }));
            let source: BoxError = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(source)) => source,
                Err(payload) => Box::new(ObserverPanic::from_payload(payload.as_ref())),
            };
            counters.observer_failures.fetch_add(1, Ordering::Relaxed);
            warn!("Async observer '{}' failed: {}", observer.id(), source);
            failures.push(ObserverFailure::new(observer.id(), source));
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(AsyncDeliveryError::ObserverFailures { failures })
    }
}

/// Builder for [`ObserverNotifier`]
pub struct NotifierBuilder {
    types: Arc<dyn TypeClosureProvider>,
    observers: Arc<dyn ObserverProvider>,
    strict: bool,
    reserved: Vec<String>,
    executor_services: Option<Arc<dyn ExecutorServices>>,
    security: Option<Arc<dyn SecurityServices>>,
}

impl NotifierBuilder {
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Reserve additional container lifecycle event type names
    pub fn reserve_event_types<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reserved.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn executor_services(mut self, services: Arc<dyn ExecutorServices>) -> Self {
        self.executor_services = Some(services);
        self
    }

    pub fn security_services(mut self, services: Arc<dyn SecurityServices>) -> Self {
        self.security = Some(services);
        self
    }

    /// Apply settings from configuration, creating a dedicated pool if sized
    pub fn with_config(mut self, config: &NotifierConfig) -> anyhow::Result<Self> {
        config.validate()?;
        self.strict = config.strict;
        self.reserved.extend(config.reserved_event_types.iter().cloned());
        if let Some(threads) = config.executor.threads {
            let executor: Arc<dyn TaskExecutor> =
                Arc::new(RayonExecutor::with_threads(threads, &config.executor.thread_name)?);
            self.executor_services = Some(Arc::new(FixedExecutorServices::new(executor)));
        }
        Ok(self)
    }

    pub fn build(self) -> ObserverNotifier {
        let validator = if self.strict {
            EventTypeValidator::strict(Arc::clone(&self.types)).reserve(&self.reserved)
        } else {
            EventTypeValidator::lenient(Arc::clone(&self.types))
        };
        // Fall back to the shared rayon pool when no executor services are installed
        let executor = match &self.executor_services {
            Some(services) => services.task_executor(),
            None => Arc::new(RayonExecutor::global()),
        };
        debug!(
            "Building {} observer notifier",
            if self.strict { "strict" } else { "lenient" }
        );

        ObserverNotifier {
            types: self.types,
            resolver: ObserverResolver::new(self.observers),
            validator,
            executor,
            security: self.security.unwrap_or_else(|| Arc::new(NoopSecurityServices)),
            counters: Arc::new(Counters::default()),
        }
    }
}
