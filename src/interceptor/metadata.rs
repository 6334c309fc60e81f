//! Interceptor Metadata
//!
//! Describes which interceptor methods apply to which interception type.
//! An [`InterceptionModel`] binds interceptor classes to a component, either
//! at class level or to individual methods, and may include the component's
//! own interceptor methods through [`TargetClassInterceptorMetadata`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::interceptor::chain::InvocationContext;
use crate::interceptor::error::{BoxError, InterceptionError, InvocationResult};

/// Kind of interception a chain performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InterceptionType {
    AroundInvoke,
    AroundConstruct,
    AroundTimeout,
    PostConstruct,
    PreDestroy,
    PrePassivate,
    PostActivate,
}

impl InterceptionType {
    pub const ALL: [InterceptionType; 7] = [
        InterceptionType::AroundInvoke,
        InterceptionType::AroundConstruct,
        InterceptionType::AroundTimeout,
        InterceptionType::PostConstruct,
        InterceptionType::PreDestroy,
        InterceptionType::PrePassivate,
        InterceptionType::PostActivate,
    ];

    /// Types intercepting a business or timeout method rather than a lifecycle stage
    pub fn is_method_level(self) -> bool {
        matches!(self, InterceptionType::AroundInvoke | InterceptionType::AroundTimeout)
    }

    pub fn is_lifecycle_callback(self) -> bool {
        !self.is_method_level()
    }

    pub fn name(self) -> &'static str {
        match self {
            InterceptionType::AroundInvoke => "AroundInvoke",
            InterceptionType::AroundConstruct => "AroundConstruct",
            InterceptionType::AroundTimeout => "AroundTimeout",
            InterceptionType::PostConstruct => "PostConstruct",
            InterceptionType::PreDestroy => "PreDestroy",
            InterceptionType::PrePassivate => "PrePassivate",
            InterceptionType::PostActivate => "PostActivate",
        }
    }
}

impl fmt::Display for InterceptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One interceptor method bound to its interceptor instance
pub trait InterceptorMethodInvocation: Send + Sync {
    /// Name used in chain traces
    fn name(&self) -> &str;

    /// Whether the method takes the invocation context.
    ///
    /// Methods that do not are invoked with `None` and cannot proceed the
    /// chain themselves.
    fn expects_invocation_context(&self) -> bool {
        true
    }

    fn invoke(&self, context: Option<&mut InvocationContext>) -> InvocationResult;
}

type AroundBody = Box<dyn Fn(&mut InvocationContext) -> InvocationResult + Send + Sync>;
type CallbackBody = Box<dyn Fn() -> Result<(), BoxError> + Send + Sync>;

enum Body {
    Around(AroundBody),
    Callback(CallbackBody),
}

/// Closure-backed interceptor method
pub struct InterceptorFn {
    name: String,
    body: Body,
}

impl InterceptorFn {
    /// Interceptor method that receives the invocation context
    pub fn around<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut InvocationContext) -> InvocationResult + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            body: Body::Around(Box::new(body)),
        }
    }

    /// Interceptor method without the invocation context
    pub fn callback<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn() -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            body: Body::Callback(Box::new(body)),
        }
    }
}

impl fmt::Debug for InterceptorFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorFn")
            .field("name", &self.name)
            .field("expects_invocation_context", &self.expects_invocation_context())
            .finish()
    }
}

impl InterceptorMethodInvocation for InterceptorFn {
    fn name(&self) -> &str {
        &self.name
    }

    fn expects_invocation_context(&self) -> bool {
        matches!(self.body, Body::Around(_))
    }

    fn invoke(&self, context: Option<&mut InvocationContext>) -> InvocationResult {
        match (&self.body, context) {
            (Body::Around(body), Some(context)) => body(context),
            (Body::Around(_), None) => Err(InterceptionError::failure(format!(
                "Interceptor method '{}' requires an invocation context",
                self.name
            ))),
            (Body::Callback(body), _) => body().map(|()| None).map_err(InterceptionError::Failure),
        }
    }
}

/// Interceptor methods of one interceptor class, by interception type
#[derive(Clone, Default)]
pub struct InterceptorClassMetadata {
    name: String,
    methods: HashMap<InterceptionType, Vec<Arc<dyn InterceptorMethodInvocation>>>,
}

impl InterceptorClassMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: HashMap::new(),
        }
    }

    /// Add an interceptor method for `interception_type`.
    ///
    /// Methods of one type run in the order they were added.
    pub fn with_method<M>(mut self, interception_type: InterceptionType, method: M) -> Self
    where
        M: InterceptorMethodInvocation + 'static,
    {
        self.methods
            .entry(interception_type)
            .or_default()
            .push(Arc::new(method));
        self
    }

    pub fn around_invoke<F>(self, body: F) -> Self
    where
        F: Fn(&mut InvocationContext) -> InvocationResult + Send + Sync + 'static,
    {
        let name = format!("{}.aroundInvoke", self.name);
        self.with_method(InterceptionType::AroundInvoke, InterceptorFn::around(name, body))
    }

    pub fn post_construct<F>(self, body: F) -> Self
    where
        F: Fn() -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let name = format!("{}.postConstruct", self.name);
        self.with_method(InterceptionType::PostConstruct, InterceptorFn::callback(name, body))
    }

    pub fn pre_destroy<F>(self, body: F) -> Self
    where
        F: Fn() -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let name = format!("{}.preDestroy", self.name);
        self.with_method(InterceptionType::PreDestroy, InterceptorFn::callback(name, body))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_eligible(&self, interception_type: InterceptionType) -> bool {
        self.methods
            .get(&interception_type)
            .is_some_and(|methods| !methods.is_empty())
    }

    /// Method invocations for `interception_type`, in declaration order
    pub fn invocations(&self, interception_type: InterceptionType) -> &[Arc<dyn InterceptorMethodInvocation>] {
        self.methods
            .get(&interception_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl fmt::Debug for InterceptorClassMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.methods.keys().copied().collect();
        types.sort();
        f.debug_struct("InterceptorClassMetadata")
            .field("name", &self.name)
            .field("types", &types)
            .finish()
    }
}

/// Interceptor methods declared on the intercepted component itself.
///
/// These run after every bound interceptor class.
#[derive(Debug, Clone, Default)]
pub struct TargetClassInterceptorMetadata {
    metadata: InterceptorClassMetadata,
}

impl TargetClassInterceptorMetadata {
    pub fn new(metadata: InterceptorClassMetadata) -> Self {
        Self { metadata }
    }

    pub fn is_eligible(&self, interception_type: InterceptionType) -> bool {
        self.metadata.is_eligible(interception_type)
    }

    pub fn invocations(&self, interception_type: InterceptionType) -> &[Arc<dyn InterceptorMethodInvocation>] {
        self.metadata.invocations(interception_type)
    }
}

/// Interceptor bindings of one component
#[derive(Debug, Clone, Default)]
pub struct InterceptionModel {
    class_interceptors: Vec<Arc<InterceptorClassMetadata>>,
    method_interceptors: HashMap<String, Vec<Arc<InterceptorClassMetadata>>>,
    target_class: Option<TargetClassInterceptorMetadata>,
}

impl InterceptionModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an interceptor class to every method and lifecycle stage
    pub fn bind_class(mut self, interceptor: InterceptorClassMetadata) -> Self {
        self.class_interceptors.push(Arc::new(interceptor));
        self
    }

    /// Bind an interceptor class to a single method
    pub fn bind_method(mut self, method: impl Into<String>, interceptor: InterceptorClassMetadata) -> Self {
        self.method_interceptors
            .entry(method.into())
            .or_default()
            .push(Arc::new(interceptor));
        self
    }

    pub fn with_target_class(mut self, metadata: TargetClassInterceptorMetadata) -> Self {
        self.target_class = Some(metadata);
        self
    }

    /// Interceptor classes applying to `interception_type`.
    ///
    /// Lifecycle types only see class-level bindings. Method-level types see
    /// class-level bindings followed by those bound to `method`.
    pub fn interceptors(
        &self,
        interception_type: InterceptionType,
        method: Option<&str>,
    ) -> Vec<Arc<InterceptorClassMetadata>> {
        let method_bound = match (interception_type.is_method_level(), method) {
            (true, Some(method)) => self.method_interceptors.get(method).map(Vec::as_slice).unwrap_or(&[]),
            _ => &[],
        };
        self.class_interceptors
            .iter()
            .chain(method_bound)
            .filter(|interceptor| interceptor.is_eligible(interception_type))
            .cloned()
            .collect()
    }

    pub fn target_class(&self) -> Option<&TargetClassInterceptorMetadata> {
        self.target_class.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.class_interceptors.is_empty() && self.method_interceptors.is_empty() && self.target_class.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_around(ctx: &mut InvocationContext) -> InvocationResult {
        ctx.proceed()
    }

    #[test]
    fn test_lifecycle_types_see_class_bindings_only() {
        let model = InterceptionModel::new()
            .bind_class(
                InterceptorClassMetadata::new("Audit")
                    .around_invoke(noop_around)
                    .post_construct(|| Ok(())),
            )
            .bind_method(
                "place",
                InterceptorClassMetadata::new("Timing")
                    .around_invoke(noop_around)
                    .post_construct(|| Ok(())),
            );

        let names = |list: Vec<Arc<InterceptorClassMetadata>>| {
            list.iter().map(|m| m.name().to_string()).collect::<Vec<_>>()
        };
        assert_eq!(names(model.interceptors(InterceptionType::AroundInvoke, Some("place"))), vec!["Audit", "Timing"]);
        assert_eq!(names(model.interceptors(InterceptionType::AroundInvoke, Some("cancel"))), vec!["Audit"]);
        assert_eq!(names(model.interceptors(InterceptionType::PostConstruct, Some("place"))), vec!["Audit"]);
        assert!(model.interceptors(InterceptionType::PreDestroy, None).is_empty());
    }

    #[test]
    fn test_callback_runs_without_context() {
        let callback = InterceptorFn::callback("cb", || Ok(()));
        assert!(!callback.expects_invocation_context());
        assert!(callback.invoke(None).unwrap().is_none());

        let around = InterceptorFn::around("around", noop_around);
        assert!(around.expects_invocation_context());
        assert!(around.invoke(None).is_err());
    }

    #[test]
    fn test_interception_type_classification() {
        let method_level: Vec<_> = InterceptionType::ALL.iter().filter(|t| t.is_method_level()).collect();
        assert_eq!(method_level, vec![&InterceptionType::AroundInvoke, &InterceptionType::AroundTimeout]);
        assert!(InterceptionType::AroundConstruct.is_lifecycle_callback());
        assert_eq!(InterceptionType::PreDestroy.to_string(), "PreDestroy");
    }
}
