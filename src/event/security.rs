//! Security Context Propagation
//!
//! The engine does not implement security; it captures the caller's context
//! when async delivery is scheduled and associates it with the worker thread
//! for the duration of the delivery task.

/// A captured security context
pub trait SecurityContext: Send {
    /// Attach this context to the current thread
    fn associate(&mut self);

    /// Detach this context from the current thread
    fn dissociate(&mut self);

    /// Release any resources held by the captured context
    fn close(&mut self);
}

/// Source of the current thread's security context
pub trait SecurityServices: Send + Sync {
    fn security_context(&self) -> Box<dyn SecurityContext>;
}

/// Security services that propagate nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSecurityServices;

struct NoopSecurityContext;

impl SecurityContext for NoopSecurityContext {
    fn associate(&mut self) {}
    fn dissociate(&mut self) {}
    fn close(&mut self) {}
}

impl SecurityServices for NoopSecurityServices {
    fn security_context(&self) -> Box<dyn SecurityContext> {
        Box::new(NoopSecurityContext)
    }
}

/// Associates a context on creation, dissociates and closes it on drop
pub(crate) struct SecurityAssociation {
    context: Box<dyn SecurityContext>,
}

impl SecurityAssociation {
    pub(crate) fn enter(mut context: Box<dyn SecurityContext>) -> Self {
        context.associate();
        Self { context }
    }
}

impl Drop for SecurityAssociation {
    fn drop(&mut self) {
        self.context.dissociate();
        self.context.close();
    }
}
