//! In-process event notification and method interception.
//!
//! [`event`] resolves the observers of a fired event against a cached
//! type/qualifier key and delivers it synchronously or on a worker pool.
//! [`interceptor`] runs interceptor chains around target methods and
//! lifecycle callbacks.

pub mod cache;
pub mod cli;
pub mod config;
pub mod event;
pub mod interceptor;
pub mod logging;

pub use event::{
    AsyncDelivery, Event, EventMetadata, EventType, NotifierError, ObserverFn, ObserverNotifier, ObserverRegistry,
    Qualifier, TypeRegistry,
};
pub use interceptor::{InterceptionChain, InterceptionError, InterceptionModel, InterceptionType, InvocationContext};
