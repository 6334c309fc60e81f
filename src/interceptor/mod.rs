//! Method Interception
//!
//! Runs the interceptor methods bound to a component around a target method
//! call or lifecycle stage.
//!
//! # Example Usage
//!
//! ```no_run
//! use eventwire::interceptor::{
//!     InterceptionChain, InterceptionModel, InterceptionType, InterceptorClassMetadata,
//! };
//!
//! let model = InterceptionModel::new().bind_class(
//!     InterceptorClassMetadata::new("Audit").around_invoke(|ctx| {
//!         println!("before {:?}", ctx.method());
//!         ctx.proceed()
//!     }),
//! );
//!
//! let chain = InterceptionChain::build(&model, InterceptionType::AroundInvoke, Some("place"))
//!     .with_completion(eventwire::interceptor::returning(42u32));
//! let result = chain.invoke(None, Some("place"), Vec::new());
//! assert!(result.is_ok());
//! ```

pub mod chain;
pub mod context;
pub mod error;
pub mod metadata;


pub use chain::{returning, ChainCompletion, InterceptionChain, InvocationContext};
pub use context::{InterceptionScope, ScopeGuard};
pub use error::{downcast_value, value, InterceptionError, InvocationResult, InvocationValue};
pub use metadata::{
    InterceptionModel, InterceptionType, InterceptorClassMetadata, InterceptorFn, InterceptorMethodInvocation,
    TargetClassInterceptorMetadata,
};
