//! Event Qualifiers
//!
//! Qualifiers narrow which observers receive an event. A qualifier is
//! identified by its kind plus its attribute values; two qualifiers of the
//! same kind with different attribute values are distinct.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Kind of the universal qualifier carried by every event
pub const ANY_QUALIFIER: &str = "Any";

/// Kind of the qualifier implied when none is given
pub const DEFAULT_QUALIFIER: &str = "Default";

/// Kind of the name-carrying qualifier
pub const NAMED_QUALIFIER: &str = "Named";

/// A qualifier instance: kind plus attribute values
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Qualifier {
    kind: Arc<str>,
    attributes: BTreeMap<String, String>,
}

impl Qualifier {
    pub fn new(kind: impl Into<Arc<str>>) -> Self {
        Self {
            kind: kind.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Add an attribute value
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn any() -> Self {
        Self::new(ANY_QUALIFIER)
    }

    pub fn default_qualifier() -> Self {
        Self::new(DEFAULT_QUALIFIER)
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::new(NAMED_QUALIFIER).with("value", name)
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn is_any(&self) -> bool {
        &*self.kind == ANY_QUALIFIER
    }
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.kind)?;
        if !self.attributes.is_empty() {
            let attrs: Vec<String> = self
                .attributes
                .iter()
                .map(|(k, v)| format!("{}={:?}", k, v))
                .collect();
            write!(f, "({})", attrs.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_values_distinguish_qualifiers() {
        assert_eq!(Qualifier::named("eu"), Qualifier::named("eu"));
        assert_ne!(Qualifier::named("eu"), Qualifier::named("us"));
        assert_ne!(Qualifier::any(), Qualifier::default_qualifier());
    }

    #[test]
    fn test_display() {
        assert_eq!(Qualifier::any().to_string(), "@Any");
        assert_eq!(Qualifier::named("eu").to_string(), "@Named(value=\"eu\")");
        assert_eq!(Qualifier::named("eu").attribute("value"), Some("eu"));
    }
}
