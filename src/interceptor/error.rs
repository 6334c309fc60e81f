//! Interception Error Types

use std::any::Any;

use thiserror::Error;

pub use crate::event::error::BoxError;

/// Value produced by an interceptor or target method; `None` for no value
pub type InvocationValue = Option<Box<dyn Any + Send>>;

/// Result type for chain steps
pub type InvocationResult = Result<InvocationValue, InterceptionError>;

/// Failure of an interceptor or the intercepted target
#[derive(Debug, Error)]
pub enum InterceptionError {
    /// Failure raised by an interceptor or the target, propagated unchanged
    #[error("{0}")]
    Failure(BoxError),

    /// Failure wrapped by an indirect invocation layer
    #[error("Invocation target failed: {0}")]
    InvocationTarget(#[source] Box<InterceptionError>),
}

impl InterceptionError {
    pub fn failure(error: impl Into<BoxError>) -> Self {
        InterceptionError::Failure(error.into())
    }

    /// Wrap `self` the way an indirect invocation layer reports a target failure
    pub fn wrap_target(self) -> Self {
        InterceptionError::InvocationTarget(Box::new(self))
    }

    /// Strip every invocation-target wrapper
    pub fn unwrap_target(self) -> Self {
        let mut error = self;
        while let InterceptionError::InvocationTarget(inner) = error {
            error = *inner;
        }
        error
    }

    pub fn is_wrapped(&self) -> bool {
        matches!(self, InterceptionError::InvocationTarget(_))
    }

    /// The underlying failure, looking through any wrappers
    pub fn root_cause(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        match self {
            InterceptionError::Failure(source) => source.as_ref(),
            InterceptionError::InvocationTarget(inner) => inner.root_cause(),
        }
    }

    /// Consume into the underlying boxed failure
    pub fn into_source(self) -> BoxError {
        match self.unwrap_target() {
            InterceptionError::Failure(source) => source,
            wrapped => Box::new(wrapped),
        }
    }
}

/// Wrap a concrete return value
pub fn value<T: Any + Send>(value: T) -> InvocationValue {
    Some(Box::new(value))
}

/// Take a concrete return value back out, if it has type `T`
pub fn downcast_value<T: Any>(value: InvocationValue) -> Option<T> {
    value.and_then(|boxed| boxed.downcast::<T>().ok()).map(|boxed| *boxed)
}
