//! Interception Chain
//!
//! An [`InterceptionChain`] is an immutable list of interceptor method
//! invocations plus the hook that runs once every interceptor has proceeded.
//! Each call gets its own [`InvocationContext`] holding the cursor, so a
//! chain can be invoked re-entrantly and from several threads at once.
//!
//! Every step runs with the chain's captured interception scope on top of
//! the thread's context stack, pushed only if it is not already there.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::trace;

use crate::interceptor::context::{self, InterceptionScope, ScopeGuard};
use crate::interceptor::error::InvocationResult;
use crate::interceptor::metadata::{
    InterceptionModel, InterceptionType, InterceptorClassMetadata, InterceptorMethodInvocation,
};

/// Hook run when the chain is exhausted, normally the target method call
pub trait ChainCompletion: Send + Sync {
    fn complete(&self, context: &mut InvocationContext) -> InvocationResult;
}

impl<F> ChainCompletion for F
where
    F: Fn(&mut InvocationContext) -> InvocationResult + Send + Sync,
{
    fn complete(&self, context: &mut InvocationContext) -> InvocationResult {
        self(context)
    }
}

/// Completion for chains with no target, such as lifecycle callbacks
struct NoTarget;

impl ChainCompletion for NoTarget {
    fn complete(&self, _context: &mut InvocationContext) -> InvocationResult {
        Ok(None)
    }
}

/// Ordered interceptor method invocations for one interception
#[derive(Clone)]
pub struct InterceptionChain {
    invocations: Arc<[Arc<dyn InterceptorMethodInvocation>]>,
    interception_type: InterceptionType,
    captured_scope: Option<InterceptionScope>,
    completion: Arc<dyn ChainCompletion>,
}

impl InterceptionChain {
    /// Build the chain for `interception_type` on `method` from a component's model.
    ///
    /// Bound interceptor classes come first, then the component's own
    /// interceptor methods when it declares any for this type.
    pub fn build(model: &InterceptionModel, interception_type: InterceptionType, method: Option<&str>) -> Self {
        let mut invocations: Vec<Arc<dyn InterceptorMethodInvocation>> = model
            .interceptors(interception_type, method)
            .iter()
            .flat_map(|interceptor| interceptor.invocations(interception_type).iter().cloned())
            .collect();
        if let Some(target_class) = model.target_class() {
            if target_class.is_eligible(interception_type) {
                invocations.extend(target_class.invocations(interception_type).iter().cloned());
            }
        }
        Self::from_invocations(invocations, interception_type)
    }

    /// Build the chain from an explicit list of interceptor classes
    pub fn from_interceptors(interceptors: &[InterceptorClassMetadata], interception_type: InterceptionType) -> Self {
        let invocations = interceptors
            .iter()
            .flat_map(|interceptor| interceptor.invocations(interception_type).iter().cloned())
            .collect();
        Self::from_invocations(invocations, interception_type)
    }

    /// Build the chain from method invocations directly.
    ///
    /// Captures the interception scope on top of the current thread's stack.
    pub fn from_invocations(
        invocations: Vec<Arc<dyn InterceptorMethodInvocation>>,
        interception_type: InterceptionType,
    ) -> Self {
        Self {
            invocations: invocations.into(),
            interception_type,
            captured_scope: context::peek(),
            completion: Arc::new(NoTarget),
        }
    }

    /// Set the hook run once every interceptor has proceeded
    pub fn with_completion<C>(mut self, completion: C) -> Self
    where
        C: ChainCompletion + 'static,
    {
        self.completion = Arc::new(completion);
        self
    }

    pub fn len(&self) -> usize {
        self.invocations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invocations.is_empty()
    }

    pub fn interception_type(&self) -> InterceptionType {
        self.interception_type
    }

    pub fn captured_scope(&self) -> Option<&InterceptionScope> {
        self.captured_scope.as_ref()
    }

    /// A fresh context positioned at the start of the chain
    pub fn new_context(
        &self,
        target: Option<Arc<dyn Any + Send + Sync>>,
        method: Option<&str>,
        parameters: Vec<Box<dyn Any + Send>>,
    ) -> InvocationContext {
        InvocationContext {
            chain: self.clone(),
            position: 0,
            target,
            method: method.map(str::to_string),
            parameters,
            context_data: HashMap::new(),
        }
    }

    /// Run the whole chain for one call
    pub fn invoke(
        &self,
        target: Option<Arc<dyn Any + Send + Sync>>,
        method: Option<&str>,
        parameters: Vec<Box<dyn Any + Send>>,
    ) -> InvocationResult {
        self.new_context(target, method, parameters).proceed()
    }
}

impl fmt::Debug for InterceptionChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.invocations.iter().map(|i| i.name()).collect();
        f.debug_struct("InterceptionChain")
            .field("interception_type", &self.interception_type)
            .field("invocations", &names)
            .field("captured_scope", &self.captured_scope)
            .finish()
    }
}

/// Per-call state of an interception: cursor, target and parameters
pub struct InvocationContext {
    chain: InterceptionChain,
    position: usize,
    target: Option<Arc<dyn Any + Send + Sync>>,
    method: Option<String>,
    parameters: Vec<Box<dyn Any + Send>>,
    context_data: HashMap<String, Box<dyn Any + Send>>,
}

impl InvocationContext {
    /// Invoke the next interceptor, or the completion hook once none remain.
    ///
    /// The cursor is restored before returning, so calling `proceed` again
    /// from the same interceptor runs the rest of the chain again.
    /// Invocation-target wrappers are stripped from any failure.
    pub fn proceed(&mut self) -> InvocationResult {
        let _scope = self.enter_captured_scope();
        let result = if self.has_next() {
            self.invoke_next()
        } else {
            let completion = Arc::clone(&self.chain.completion);
            completion.complete(self)
        };
        result.map_err(|error| error.unwrap_target())
    }

    fn enter_captured_scope(&self) -> Option<ScopeGuard> {
        self.chain.captured_scope.as_ref().map(context::push_if_not_on_top)
    }

    fn invoke_next(&mut self) -> InvocationResult {
        let saved = self.position;
        let result = self.run_from_cursor();
        self.position = saved;
        result
    }

    /// Invoke from the cursor, running any interceptors that do not take the
    /// context back to back
    fn run_from_cursor(&mut self) -> InvocationResult {
        loop {
            let Some(invocation) = self.chain.invocations.get(self.position).cloned() else {
                return Ok(None);
            };
            self.position += 1;
            trace!("Invoking next interceptor in chain: {}", invocation.name());

            if invocation.expects_invocation_context() {
                return invocation.invoke(Some(&mut *self));
            }
            invocation.invoke(None)?;
        }
    }

    pub fn has_next(&self) -> bool {
        self.position < self.chain.invocations.len()
    }

    /// Index of the next invocation to run
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn interception_type(&self) -> InterceptionType {
        self.chain.interception_type
    }

    pub fn target(&self) -> Option<&Arc<dyn Any + Send + Sync>> {
        self.target.as_ref()
    }

    /// The target downcast to `T`
    pub fn target_as<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.target.as_ref().and_then(|target| target.downcast_ref::<T>())
    }

    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    pub fn parameters(&self) -> &[Box<dyn Any + Send>] {
        &self.parameters
    }

    pub fn parameter<T: Any>(&self, index: usize) -> Option<&T> {
        self.parameters.get(index).and_then(|p| p.downcast_ref::<T>())
    }

    /// Replace the parameters seen by later interceptors and the target
    pub fn set_parameters(&mut self, parameters: Vec<Box<dyn Any + Send>>) {
        self.parameters = parameters;
    }

    pub fn context_data(&self) -> &HashMap<String, Box<dyn Any + Send>> {
        &self.context_data
    }

    pub fn context_data_mut(&mut self) -> &mut HashMap<String, Box<dyn Any + Send>> {
        &mut self.context_data
    }

    /// Typed lookup into the context data
    pub fn data<T: Any>(&self, key: &str) -> Option<&T> {
        self.context_data.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    pub fn set_data<T: Any + Send>(&mut self, key: impl Into<String>, value: T) -> Option<Box<dyn Any + Send>> {
        self.context_data.insert(key.into(), Box::new(value))
    }
}

impl fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationContext")
            .field("interception_type", &self.chain.interception_type)
            .field("position", &self.position)
            .field("method", &self.method)
            .field("parameters", &self.parameters.len())
            .finish()
    }
}

/// Shorthand for a completion returning `value` from the target call
pub fn returning<T>(value: T) -> impl ChainCompletion
where
    T: Any + Send + Sync + Clone,
{
    move |_: &mut InvocationContext| -> InvocationResult { Ok(Some(Box::new(value.clone()))) }
}
