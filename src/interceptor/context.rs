//! Interception Context Stack
//!
//! Per-thread stack of the interception scopes currently active. Nested proxy
//! calls consult the top entry to see which interception they belong to. The
//! stack is never shared between threads.

use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

/// Marker for one active interception, compared by identity
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct InterceptionScope {
    id: u64,
    label: Arc<str>,
}

impl InterceptionScope {
    pub fn new(label: impl Into<Arc<str>>) -> Self {
        Self {
            id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
            label: label.into(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for InterceptionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InterceptionScope({}#{})", self.label, self.id)
    }
}

thread_local! {
    static INTERCEPTION_CONTEXT: RefCell<Vec<InterceptionScope>> = const { RefCell::new(Vec::new()) };
}

/// The scope on top of this thread's stack
pub fn peek() -> Option<InterceptionScope> {
    INTERCEPTION_CONTEXT.with(|stack| stack.borrow().last().cloned())
}

pub fn depth() -> usize {
    INTERCEPTION_CONTEXT.with(|stack| stack.borrow().len())
}

pub fn is_empty() -> bool {
    depth() == 0
}

/// Push `scope` unconditionally until the guard drops
#[must_use = "the scope is popped when the guard is dropped"]
pub fn start(scope: InterceptionScope) -> ScopeGuard {
    INTERCEPTION_CONTEXT.with(|stack| stack.borrow_mut().push(scope));
    ScopeGuard { pushed: true }
}

/// Push `scope` unless it is already on top.
///
/// The returned guard pops only what this call pushed.
#[must_use = "the scope is popped when the guard is dropped"]
pub fn push_if_not_on_top(scope: &InterceptionScope) -> ScopeGuard {
    let pushed = INTERCEPTION_CONTEXT.with(|stack| {
        let mut stack = stack.borrow_mut();
        if stack.last() == Some(scope) {
            false
        } else {
            stack.push(scope.clone());
            true
        }
    });
    ScopeGuard { pushed }
}

/// Pops the pushed scope on drop, including during unwinding
pub struct ScopeGuard {
    pushed: bool,
}

impl ScopeGuard {
    pub fn pushed(&self) -> bool {
        self.pushed
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        if self.pushed {
            INTERCEPTION_CONTEXT.with(|stack| {
                stack.borrow_mut().pop();
            });
        }
    }
}
