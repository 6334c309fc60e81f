//! Runtime Event Types
//!
//! Events carry a runtime type descriptor rather than a compile-time Rust type
//! so that observers can match on supertypes and parameterized types the way
//! a bean container does. Type closures (a type plus all of its supertypes)
//! are supplied by a [`TypeClosureProvider`].

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use log::debug;
use parking_lot::RwLock;

use crate::cache::ComputingCache;

/// Raw name of the universal top type
pub const OBJECT_TYPE_NAME: &str = "Object";

/// A set of types closed under the supertype relation
pub type TypeClosure = BTreeSet<EventType>;

/// Type argument of a parameterized event type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeArg {
    /// A fully specified type
    Concrete(EventType),
    /// An unresolved type variable such as `T`
    Variable(String),
    /// A wildcard (`?`)
    Wildcard,
}

/// Runtime type descriptor of an event
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventType {
    name: Arc<str>,
    args: Vec<TypeArg>,
}

impl EventType {
    /// A non-parameterized type
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// A parameterized type such as `Envelope<Order>`
    pub fn generic(name: impl Into<Arc<str>>, args: Vec<TypeArg>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// The universal top type every event type is assignable to
    pub fn object() -> Self {
        Self::named(OBJECT_TYPE_NAME)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[TypeArg] {
        &self.args
    }

    pub fn is_object(&self) -> bool {
        self.args.is_empty() && &*self.name == OBJECT_TYPE_NAME
    }

    /// The raw (erased) form of this type
    pub fn raw(&self) -> Self {
        Self::named(Arc::clone(&self.name))
    }

    /// True if a type variable or wildcard appears anywhere in this type
    pub fn contains_unresolved(&self) -> bool {
        self.args.iter().any(|arg| match arg {
            TypeArg::Concrete(inner) => inner.contains_unresolved(),
            TypeArg::Variable(_) | TypeArg::Wildcard => true,
        })
    }

    /// Whether an observer declared for `self` accepts a value of type `candidate`.
    ///
    /// Raw names must match. A raw observed type accepts every parameterization;
    /// otherwise arguments are compared pairwise, with variables and wildcards
    /// accepting anything.
    pub fn accepts(&self, candidate: &EventType) -> bool {
        if self.name != candidate.name {
            return false;
        }
        if self.args.is_empty() {
            return true;
        }
        if self.args.len() != candidate.args.len() {
            return false;
        }
        self.args
            .iter()
            .zip(candidate.args.iter())
            .all(|(declared, actual)| match (declared, actual) {
                (TypeArg::Variable(_) | TypeArg::Wildcard, _) => true,
                (TypeArg::Concrete(d), TypeArg::Concrete(a)) => d.accepts(a),
                (TypeArg::Concrete(_), _) => false,
            })
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.args.is_empty() {
            write!(f, "<")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", arg)?;
            }
            write!(f, ">")?;
        }
        Ok(())
    }
}

impl fmt::Display for TypeArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeArg::Concrete(t) => write!(f, "{}", t),
            TypeArg::Variable(name) => write!(f, "{}", name),
            TypeArg::Wildcard => write!(f, "?"),
        }
    }
}

impl From<EventType> for TypeArg {
    fn from(value: EventType) -> Self {
        TypeArg::Concrete(value)
    }
}

/// Source of type closures, normally backed by the bean metadata subsystem
pub trait TypeClosureProvider: Send + Sync {
    /// The type itself plus every supertype it is assignable to.
    ///
    /// Must be pure given the type, so results can be cached.
    fn type_closure(&self, event_type: &EventType) -> Arc<TypeClosure>;
}

/// In-memory type hierarchy with memoized closures
pub struct TypeRegistry {
    supertypes: RwLock<HashMap<Arc<str>, Vec<EventType>>>,
    closures: ComputingCache<EventType, Arc<TypeClosure>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            supertypes: RwLock::new(HashMap::new()),
            closures: ComputingCache::new(),
        }
    }

    /// Declare the direct supertypes of a raw type name.
    ///
    /// Declarations are keyed by raw name and apply to every parameterization.
    /// Cached closures are dropped since any of them may now be stale.
    pub fn declare(&self, name: &str, direct_supertypes: Vec<EventType>) {
        debug!("Declaring type '{}' with supertypes {:?}", name, direct_supertypes);
        self.supertypes
            .write()
            .insert(Arc::from(name), direct_supertypes);
        self.closures.clear();
    }

    /// Builder-style variant of [`TypeRegistry::declare`]
    pub fn with_type(self, name: &str, direct_supertypes: Vec<EventType>) -> Self {
        self.declare(name, direct_supertypes);
        self
    }

    fn compute_closure(&self, event_type: &EventType) -> Arc<TypeClosure> {
        let declared = self.supertypes.read();
        let mut closure = TypeClosure::new();
        let mut pending = vec![event_type.clone()];

        while let Some(current) = pending.pop() {
            if !closure.insert(current.clone()) {
                continue;
            }
            if let Some(parents) = declared.get(current.name()) {
                pending.extend(parents.iter().cloned());
            }
        }
        Arc::new(closure)
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeClosureProvider for TypeRegistry {
    fn type_closure(&self, event_type: &EventType) -> Arc<TypeClosure> {
        self.closures
            .get_or_compute(event_type, |t| self.compute_closure(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_hierarchy() -> TypeRegistry {
        TypeRegistry::new()
            .with_type("OrderPlaced", vec![EventType::named("OrderEvent")])
            .with_type("OrderEvent", vec![EventType::named("DomainEvent")])
            .with_type("DomainEvent", vec![])
    }

    #[test]
    fn test_display_formats_arguments() {
        let t = EventType::generic(
            "Envelope",
            vec![
                EventType::named("Order").into(),
                TypeArg::Wildcard,
                TypeArg::Variable("T".to_string()),
            ],
        );
        assert_eq!(t.to_string(), "Envelope<Order, ?, T>");
    }

    #[test]
    fn test_contains_unresolved_is_recursive() {
        let nested = EventType::generic(
            "Envelope",
            vec![EventType::generic("List", vec![TypeArg::Variable("T".into())]).into()],
        );
        assert!(nested.contains_unresolved());
        assert!(!EventType::generic("List", vec![EventType::named("Order").into()]).contains_unresolved());
        assert!(!EventType::named("Order").contains_unresolved());
    }

    #[test]
    fn test_accepts_raw_and_wildcard() {
        let list_of_orders = EventType::generic("List", vec![EventType::named("Order").into()]);
        let list_of_users = EventType::generic("List", vec![EventType::named("User").into()]);

        assert!(EventType::named("List").accepts(&list_of_orders));
        assert!(EventType::generic("List", vec![TypeArg::Wildcard]).accepts(&list_of_users));
        assert!(list_of_orders.accepts(&list_of_orders));
        assert!(!list_of_orders.accepts(&list_of_users));
        assert!(!EventType::named("Set").accepts(&list_of_orders));
    }

    #[test]
    fn test_transitive_closure() {
        let registry = order_hierarchy();
        let closure = registry.type_closure(&EventType::named("OrderPlaced"));

        assert!(closure.contains(&EventType::named("OrderPlaced")));
        assert!(closure.contains(&EventType::named("OrderEvent")));
        assert!(closure.contains(&EventType::named("DomainEvent")));
        assert_eq!(closure.len(), 3);
    }

    #[test]
    fn test_unknown_type_closure_is_itself() {
        let registry = TypeRegistry::new();
        let closure = registry.type_closure(&EventType::named("Loose"));
        assert_eq!(closure.len(), 1);
    }

    #[test]
    fn test_closure_is_memoized_until_redeclared() {
        let registry = order_hierarchy();
        let first = registry.type_closure(&EventType::named("OrderPlaced"));
        let second = registry.type_closure(&EventType::named("OrderPlaced"));
        assert!(Arc::ptr_eq(&first, &second));

        registry.declare("DomainEvent", vec![EventType::named("Auditable")]);
        let third = registry.type_closure(&EventType::named("OrderPlaced"));
        assert!(third.contains(&EventType::named("Auditable")));
    }
}
