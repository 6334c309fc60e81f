//! Notifier Error Types

use std::fmt;

use thiserror::Error;

use crate::event::types::EventType;

/// Error type returned by observer bodies
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for notifier operations
pub type NotifierResult<T> = Result<T, NotifierError>;

/// Errors raised synchronously to the firing caller
#[derive(Debug, Error)]
pub enum NotifierError {
    /// Strict event type check failed; no observer was reached
    #[error(transparent)]
    InvalidEventType(#[from] InvalidEventType),

    /// A synchronous or transactional observer failed; later observers were skipped
    #[error(transparent)]
    ObserverFailed(#[from] ObserverFailure),
}

impl NotifierError {
    /// The observer failure, if this is one
    pub fn observer_failure(&self) -> Option<&ObserverFailure> {
        match self {
            NotifierError::ObserverFailed(failure) => Some(failure),
            NotifierError::InvalidEventType(_) => None,
        }
    }
}

/// Event type rejected by strict validation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidEventType {
    #[error("Event type {event_type} contains a type variable or wildcard")]
    TypeParameterNotAllowed { event_type: EventType },

    #[error("Event type {event_type} is assignable to container lifecycle event type {reserved}")]
    ReservedLifecycleType {
        event_type: EventType,
        reserved: EventType,
    },
}

/// Failure of a single observer
#[derive(Debug, Error)]
#[error("Observer '{observer_id}' failed: {source}")]
pub struct ObserverFailure {
    observer_id: String,
    #[source]
    source: BoxError,
}

impl ObserverFailure {
    pub fn new(observer_id: impl Into<String>, source: BoxError) -> Self {
        Self {
            observer_id: observer_id.into(),
            source,
        }
    }

    pub fn observer_id(&self) -> &str {
        &self.observer_id
    }

    /// The error exactly as the observer returned it
    pub fn cause(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.source.as_ref()
    }

    pub fn into_source(self) -> BoxError {
        self.source
    }
}

/// Panic raised inside an asynchronously notified observer
#[derive(Debug, Error)]
#[error("Observer panicked: {message}")]
pub struct ObserverPanic {
    pub message: String,
}

impl ObserverPanic {
    pub(crate) fn from_payload(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self { message }
    }
}

/// Failure channel of an asynchronous delivery
#[derive(Debug, Error)]
pub enum AsyncDeliveryError {
    /// One or more async observers failed; every failure is retained
    #[error("{}", FailureSummary(.failures))]
    ObserverFailures { failures: Vec<ObserverFailure> },

    /// The delivery task was dropped before it could complete
    #[error("Async delivery task was abandoned before completion")]
    Abandoned,
}

impl AsyncDeliveryError {
    /// Individual observer failures, in notification order
    pub fn failures(&self) -> &[ObserverFailure] {
        match self {
            AsyncDeliveryError::ObserverFailures { failures } => failures,
            AsyncDeliveryError::Abandoned => &[],
        }
    }
}

struct FailureSummary<'a>(&'a [ObserverFailure]);

impl fmt::Display for FailureSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} async observer(s) failed", self.0.len())?;
        for failure in self.0 {
            write!(f, "; {}", failure)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_observer_failure_keeps_source() {
        let failure = ObserverFailure::new("billing", "card declined".into());
        assert_eq!(failure.to_string(), "Observer 'billing' failed: card declined");
        assert_eq!(failure.source().unwrap().to_string(), "card declined");

        let err: NotifierError = failure.into();
        assert_eq!(err.observer_failure().unwrap().observer_id(), "billing");
    }

    #[test]
    fn test_composite_message_lists_failures() {
        let err = AsyncDeliveryError::ObserverFailures {
            failures: vec![
                ObserverFailure::new("a", "first".into()),
                ObserverFailure::new("b", "second".into()),
            ],
        };
        assert_eq!(
            err.to_string(),
            "2 async observer(s) failed; Observer 'a' failed: first; Observer 'b' failed: second"
        );
        assert_eq!(err.failures().len(), 2);
        assert!(AsyncDeliveryError::Abandoned.failures().is_empty());
    }

    #[test]
    fn test_invalid_event_type_message() {
        let err = InvalidEventType::ReservedLifecycleType {
            event_type: EventType::named("MyStartup"),
            reserved: EventType::named("BeforeShutdown"),
        };
        assert_eq!(
            err.to_string(),
            "Event type MyStartup is assignable to container lifecycle event type BeforeShutdown"
        );
    }

    #[test]
    fn test_panic_payload_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(ObserverPanic::from_payload(payload.as_ref()).message, "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(ObserverPanic::from_payload(payload.as_ref()).message, "bang");
    }
}
