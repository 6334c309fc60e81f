//! Event Metadata
//!
//! Metadata about the event currently being delivered, kept on a per-thread
//! stack so that code running inside an observer can look it up without it
//! being threaded through every call.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::event::qualifier::Qualifier;
use crate::event::types::EventType;

/// Information about a fired event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMetadata {
    event_type: EventType,
    qualifiers: BTreeSet<Qualifier>,
    injection_point: Option<String>,
}

impl EventMetadata {
    pub fn new(event_type: EventType, qualifiers: &[Qualifier]) -> Self {
        Self {
            event_type,
            qualifiers: qualifiers.iter().cloned().collect(),
            injection_point: None,
        }
    }

    /// Record where the firing event handle was obtained
    pub fn with_injection_point(mut self, injection_point: impl Into<String>) -> Self {
        self.injection_point = Some(injection_point.into());
        self
    }

    pub fn event_type(&self) -> &EventType {
        &self.event_type
    }

    pub fn qualifiers(&self) -> &BTreeSet<Qualifier> {
        &self.qualifiers
    }

    pub fn injection_point(&self) -> Option<&str> {
        self.injection_point.as_deref()
    }
}

thread_local! {
    static CURRENT_EVENT_METADATA: RefCell<Vec<Arc<EventMetadata>>> = const { RefCell::new(Vec::new()) };
}

/// Metadata of the innermost event being delivered on this thread
pub fn current() -> Option<Arc<EventMetadata>> {
    CURRENT_EVENT_METADATA.with(|stack| stack.borrow().last().cloned())
}

/// Depth of this thread's metadata stack
pub fn depth() -> usize {
    CURRENT_EVENT_METADATA.with(|stack| stack.borrow().len())
}

/// Push `metadata` for the lifetime of the returned guard.
///
/// `None` pushes nothing and the guard is inert.
#[must_use = "metadata is popped when the scope is dropped"]
pub fn push_if_some(metadata: Option<Arc<EventMetadata>>) -> MetadataScope {
    let pushed = match metadata {
        Some(metadata) => {
            CURRENT_EVENT_METADATA.with(|stack| stack.borrow_mut().push(metadata));
            true
        }
        None => false,
    };
    MetadataScope { pushed }
}

/// Pops the pushed metadata on drop, including during unwinding
pub struct MetadataScope {
    pushed: bool,
}

impl Drop for MetadataScope {
    fn drop(&mut self) {
        if self.pushed {
            CURRENT_EVENT_METADATA.with(|stack| {
                stack.borrow_mut().pop();
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(name: &str) -> Arc<EventMetadata> {
        Arc::new(EventMetadata::new(EventType::named(name), &[Qualifier::default_qualifier()]))
    }

    #[test]
    fn test_scopes_nest_and_unwind() {
        assert!(current().is_none());
        {
            let _outer = push_if_some(Some(metadata("Outer")));
            assert_eq!(current().unwrap().event_type().name(), "Outer");
            {
                let _inner = push_if_some(Some(metadata("Inner")));
                assert_eq!(depth(), 2);
                assert_eq!(current().unwrap().event_type().name(), "Inner");
            }
            assert_eq!(current().unwrap().event_type().name(), "Outer");
        }
        assert_eq!(depth(), 0);
    }

    #[test]
    fn test_none_pushes_nothing() {
        let _outer = push_if_some(Some(metadata("Outer")));
        {
            let _noop = push_if_some(None);
            assert_eq!(depth(), 1);
        }
        assert_eq!(depth(), 1);
    }

    #[test]
    fn test_stack_is_per_thread() {
        let _outer = push_if_some(Some(metadata("Outer")));
        let seen = std::thread::spawn(|| current().is_some()).join().unwrap();
        assert!(!seen);
    }

    #[test]
    fn test_injection_point() {
        let m = EventMetadata::new(EventType::named("OrderPlaced"), &[])
            .with_injection_point("OrderService.events");
        assert_eq!(m.injection_point(), Some("OrderService.events"));
        assert!(m.qualifiers().is_empty());
    }
}
