//! Event Notification
//!
//! Resolves the observers interested in a fired event and delivers the event
//! to them, synchronously or on a worker pool.
//!
//! # Architecture
//!
//! - **Types**: event types with type arguments and a supertype closure
//! - **Resolvable keys**: type closure plus qualifiers, used as the cache key
//! - **Observers**: registered handlers with phase, async flag and priority
//! - **Resolver**: matches observers to keys and caches the partitioned result
//! - **ObserverNotifier**: validation, resolution and delivery
//!
//! # Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use eventwire::event::{Event, EventType, ObserverFn, ObserverNotifier, ObserverRegistry, TypeRegistry};
//!
//! #[derive(Debug)]
//! struct OrderPlaced;
//!
//! impl Event for OrderPlaced {
//!     fn event_type(&self) -> EventType {
//!         EventType::named("OrderPlaced")
//!     }
//! }
//!
//! # fn main() -> anyhow::Result<()> {
//! let types = Arc::new(TypeRegistry::new());
//! let observers = Arc::new(ObserverRegistry::new());
//! observers.register(
//!     ObserverFn::builder("audit", EventType::named("OrderPlaced")).build(|event, _| {
//!         println!("observed {:?}", event);
//!         Ok(())
//!     }),
//! )?;
//!
//! let notifier = ObserverNotifier::strict(types, observers);
//! notifier.fire_event(&OrderPlaced, None, &[])?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod delivery;
pub mod error;
pub mod executor;
pub mod metadata;
pub mod notifier;
pub mod observer;
pub mod qualifier;
pub mod registry;
pub mod resolvable;
pub mod resolver;
pub mod security;
pub mod types;
pub mod validation;


pub use config::{ConfigError, ExecutorConfig, NotifierConfig};
pub use delivery::{AsyncDelivery, DeliveryResult};
pub use error::{
    AsyncDeliveryError, BoxError, InvalidEventType, NotifierError, NotifierResult, ObserverFailure,
    ObserverPanic,
};
pub use executor::{ExecutorServices, FixedExecutorServices, RayonExecutor, TaskExecutor, TokioBlockingExecutor};
pub use metadata::EventMetadata;
pub use notifier::{NotifierBuilder, NotifierStats, ObserverNotifier};
pub use observer::{Event, ObserverFn, ObserverFnBuilder, ObserverMethod, TransactionPhase, DEFAULT_OBSERVER_PRIORITY};
pub use qualifier::Qualifier;
pub use registry::{ObserverProvider, ObserverRegistry, RegistryError};
pub use resolvable::{ResolvableBuilder, ResolvableKey};
pub use resolver::{ObserverResolver, ResolvedObservers};
pub use security::{NoopSecurityServices, SecurityContext, SecurityServices};
pub use types::{EventType, TypeArg, TypeClosure, TypeClosureProvider, TypeRegistry};
pub use validation::{EventTypeValidator, CONTAINER_LIFECYCLE_EVENT_TYPES};
