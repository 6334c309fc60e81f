//! Resolvable Keys
//!
//! A [`ResolvableKey`] is the immutable (type closure, qualifier set) pair an
//! event firing resolves against. It doubles as the resolution cache key, so
//! equality is structural and the hash is computed once at construction.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::event::qualifier::Qualifier;
use crate::event::types::{EventType, TypeClosure, TypeClosureProvider};

/// Immutable matching predicate and cache key for observer resolution
#[derive(Clone)]
pub struct ResolvableKey {
    types: Arc<TypeClosure>,
    qualifiers: Arc<BTreeSet<Qualifier>>,
    hash: u64,
}

impl ResolvableKey {
    fn new(types: TypeClosure, qualifiers: BTreeSet<Qualifier>) -> Self {
        let mut hasher = DefaultHasher::new();
        types.hash(&mut hasher);
        qualifiers.hash(&mut hasher);
        Self {
            types: Arc::new(types),
            qualifiers: Arc::new(qualifiers),
            hash: hasher.finish(),
        }
    }

    pub fn types(&self) -> &TypeClosure {
        &self.types
    }

    pub fn qualifiers(&self) -> &BTreeSet<Qualifier> {
        &self.qualifiers
    }

    /// True if some type in the closure is accepted by `declared`
    pub fn has_type_accepted_by(&self, declared: &EventType) -> bool {
        self.types.iter().any(|t| declared.accepts(t))
    }

    /// True if every qualifier in `required` is present on this key
    pub fn has_all_qualifiers<'a, I>(&self, required: I) -> bool
    where
        I: IntoIterator<Item = &'a Qualifier>,
    {
        required.into_iter().all(|q| self.qualifiers.contains(q))
    }
}

impl PartialEq for ResolvableKey {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
            && self.types == other.types
            && self.qualifiers == other.qualifiers
    }
}

impl Eq for ResolvableKey {}

impl Hash for ResolvableKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl fmt::Debug for ResolvableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvableKey")
            .field("types", &self.types.iter().map(ToString::to_string).collect::<Vec<_>>())
            .field("qualifiers", &self.qualifiers.iter().map(ToString::to_string).collect::<Vec<_>>())
            .finish()
    }
}

/// Assembles a [`ResolvableKey`].
///
/// The universal top type and the `@Any` qualifier are always added.
/// Duplicate qualifier detection is not done here.
#[derive(Default)]
pub struct ResolvableBuilder {
    types: TypeClosure,
    qualifiers: BTreeSet<Qualifier>,
}

impl ResolvableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from the type closure of `event_type`
    pub fn for_event_type(provider: &dyn TypeClosureProvider, event_type: &EventType) -> Self {
        Self::new().add_types(provider.type_closure(event_type).iter().cloned())
    }

    pub fn add_type(mut self, event_type: EventType) -> Self {
        self.types.insert(event_type);
        self
    }

    pub fn add_types<I: IntoIterator<Item = EventType>>(mut self, types: I) -> Self {
        self.types.extend(types);
        self
    }

    pub fn add_qualifier(mut self, qualifier: Qualifier) -> Self {
        self.qualifiers.insert(qualifier);
        self
    }

    pub fn add_qualifiers<'a, I>(mut self, qualifiers: I) -> Self
    where
        I: IntoIterator<Item = &'a Qualifier>,
    {
        self.qualifiers.extend(qualifiers.into_iter().cloned());
        self
    }

    pub fn create(mut self) -> ResolvableKey {
        self.types.insert(EventType::object());
        self.qualifiers.insert(Qualifier::any());
        ResolvableKey::new(self.types, self.qualifiers)
    }
}

/// Build the key an event of `event_type` with `qualifiers` resolves against
pub fn build(
    provider: &dyn TypeClosureProvider,
    event_type: &EventType,
    qualifiers: &[Qualifier],
) -> ResolvableKey {
    ResolvableBuilder::for_event_type(provider, event_type)
        .add_qualifiers(qualifiers)
        .create()
}
